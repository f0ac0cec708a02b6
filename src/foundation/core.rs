use std::fmt;

use crate::foundation::error::{RenderError, RenderResult};

pub use kurbo::Rect;

/// Largest accepted output edge, in pixels.
pub const MAX_DIMENSION: u32 = 8192;

/// Output raster dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct TargetSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl TargetSize {
    /// Create a validated size. Both edges must be in `1..=MAX_DIMENSION`.
    pub fn new(width: u32, height: u32) -> RenderResult<Self> {
        if width == 0 || height == 0 {
            return Err(RenderError::invalid_size(format!(
                "{width}x{height}: width and height must be positive"
            )));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(RenderError::invalid_size(format!(
                "{width}x{height}: edges are limited to {MAX_DIMENSION}px"
            )));
        }
        Ok(Self { width, height })
    }

    /// Parse a `WIDTHxHEIGHT` string. Surrounding whitespace and an upper-case `X` are accepted.
    pub fn parse(s: &str) -> RenderResult<Self> {
        let trimmed = s.trim();
        let Some((w, h)) = trimmed.split_once(['x', 'X']) else {
            return Err(RenderError::invalid_size(format!(
                "'{s}' is not a known preset or WIDTHxHEIGHT"
            )));
        };
        let parse_edge = |v: &str| -> RenderResult<u32> {
            if v.is_empty() || !v.bytes().all(|b| b.is_ascii_digit()) {
                return Err(RenderError::invalid_size(format!(
                    "'{s}' is not a known preset or WIDTHxHEIGHT"
                )));
            }
            v.parse::<u32>()
                .map_err(|_| RenderError::invalid_size(format!("'{s}' is out of range")))
        };
        Self::new(parse_edge(w)?, parse_edge(h)?)
    }

    pub fn as_f64(self) -> (f64, f64) {
        (f64::from(self.width), f64::from(self.height))
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque background color stored as six upper-case hex digits without the leading `#`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HexColor(String);

impl HexColor {
    pub fn white() -> Self {
        Self("FFFFFF".to_string())
    }

    /// Normalize `#RRGGBB` / `RRGGBB`. An empty string resolves to white.
    pub fn parse(s: &str) -> RenderResult<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('#').unwrap_or(s);
        if digits.is_empty() {
            return Ok(Self::white());
        }
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(RenderError::invalid_params(format!(
                "background color '{s}' must be six hex digits"
            )));
        }
        Ok(Self(digits.to_ascii_uppercase()))
    }

    /// The normalized digits, without `#`.
    pub fn digits(&self) -> &str {
        &self.0
    }

    /// The `#RRGGBB` form handed to the executor.
    pub fn to_executor_arg(&self) -> String {
        format!("#{}", self.0)
    }

    pub fn rgb(&self) -> [u8; 3] {
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0xFF);
        [channel(0), channel(2), channel(4)]
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::white()
    }
}

impl TryFrom<String> for HexColor {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(value: HexColor) -> Self {
        value.0
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Crop rectangle in percent of the source image's natural dimensions.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CropRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

const PCT_EPSILON: f64 = 1e-6;

impl CropRect {
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 100.0,
        height: 100.0,
    };

    /// Out-of-range rectangles are rejected rather than clamped.
    pub fn validate(&self) -> RenderResult<()> {
        let fields = [
            ("cropX", self.x),
            ("cropY", self.y),
            ("cropW", self.width),
            ("cropH", self.height),
        ];
        for (name, v) in fields {
            if !v.is_finite() {
                return Err(RenderError::invalid_params(format!("{name} must be finite")));
            }
            if !(0.0..=100.0).contains(&v) {
                return Err(RenderError::invalid_params(format!(
                    "{name}={v} must be within [0, 100]"
                )));
            }
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(RenderError::invalid_params(
                "crop width and height must be positive",
            ));
        }
        if self.x + self.width > 100.0 + PCT_EPSILON || self.y + self.height > 100.0 + PCT_EPSILON
        {
            return Err(RenderError::invalid_params(
                "crop rectangle extends past the image edge",
            ));
        }
        Ok(())
    }

    pub fn is_full_frame(&self) -> bool {
        *self == Self::FULL
    }

    /// Percent geometry, `{w}%x{h}%+{x}%+{y}%`.
    pub fn to_geometry(&self) -> String {
        format!(
            "{}%x{}%+{}%+{}%",
            self.width, self.height, self.x, self.y
        )
    }

    /// Absolute pixel rectangle against an image of `width`x`height`, rounded to whole pixels
    /// and kept inside the image with at least one pixel on each axis.
    pub fn to_pixels(&self, width: u32, height: u32) -> Rect {
        let (w, h) = (f64::from(width), f64::from(height));
        let x0 = (self.x / 100.0 * w).round().clamp(0.0, (w - 1.0).max(0.0));
        let y0 = (self.y / 100.0 * h).round().clamp(0.0, (h - 1.0).max(0.0));
        let cw = (self.width / 100.0 * w).round().clamp(1.0, w - x0);
        let ch = (self.height / 100.0 * h).round().clamp(1.0, h - y0);
        Rect::new(x0, y0, x0 + cw, y0 + ch)
    }
}

impl Default for CropRect {
    fn default() -> Self {
        Self::FULL
    }
}

/// Signed pixel offset used for overlay placement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelOffset {
    pub x: i64,
    pub y: i64,
}

impl PixelOffset {
    /// `+X+Y` geometry; negative values keep their native `-`.
    pub fn to_geometry(self) -> String {
        fn signed(v: i64) -> String {
            if v >= 0 { format!("+{v}") } else { v.to_string() }
        }
        format!("{}{}", signed(self.x), signed(self.y))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
