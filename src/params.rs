//! Render parameter model: one validated value per render request, plus the geometry derived
//! from it.
//!
//! Percentages always reference a fixed dimension: crop values reference the original image,
//! overlay scale and offset reference the target size.

use crate::foundation::core::{CropRect, HexColor, MAX_DIMENSION, PixelOffset, TargetSize};
use crate::foundation::error::{RenderError, RenderResult};
use crate::schema::Overlay;

/// Nominal value of brightness, contrast and overlay scale (no change).
pub const NOMINAL: f64 = 100.0;

const MAX_SCALE_PCT: f64 = 1000.0;
const MAX_OFFSET_PCT: f64 = 1000.0;

/// Rounds half-way cases toward positive infinity, so offsets move by the same number of pixels
/// regardless of sign.
pub(crate) fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// Brightness and contrast, nominal 100 = unchanged, accepted domain `[0, 200]`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ToneAdjust {
    pub brightness: f64,
    pub contrast: f64,
}

impl ToneAdjust {
    pub const NEUTRAL: Self = Self {
        brightness: NOMINAL,
        contrast: NOMINAL,
    };

    pub fn validate(&self) -> RenderResult<()> {
        for (name, v) in [("brightness", self.brightness), ("contrast", self.contrast)] {
            if !v.is_finite() || !(0.0..=200.0).contains(&v) {
                return Err(RenderError::invalid_params(format!(
                    "{name}={v} must be within [0, 200]"
                )));
            }
        }
        Ok(())
    }

    /// Signed `(brightness, contrast)` in `[-100, 100]`.
    pub fn signed(&self) -> (f64, f64) {
        (self.brightness - NOMINAL, self.contrast - NOMINAL)
    }
}

impl Default for ToneAdjust {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Selected overlay with independent per-axis scale and offset, all in percent of the target
/// size.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverlayPlacement {
    pub overlay: Overlay,
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl OverlayPlacement {
    /// 1:1 scale, no offset.
    pub fn new(overlay: Overlay) -> Self {
        Self {
            overlay,
            scale_x: NOMINAL,
            scale_y: NOMINAL,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }

    pub fn validate(&self) -> RenderResult<()> {
        for (name, v) in [("overlayScaleX", self.scale_x), ("overlayScaleY", self.scale_y)] {
            if !v.is_finite() || v <= 0.0 || v > MAX_SCALE_PCT {
                return Err(RenderError::invalid_params(format!(
                    "{name}={v} must be within (0, {MAX_SCALE_PCT}]"
                )));
            }
        }
        for (name, v) in [
            ("overlayOffsetX", self.offset_x),
            ("overlayOffsetY", self.offset_y),
        ] {
            if !v.is_finite() || v.abs() > MAX_OFFSET_PCT {
                return Err(RenderError::invalid_params(format!(
                    "{name}={v} must be within [-{MAX_OFFSET_PCT}, {MAX_OFFSET_PCT}]"
                )));
            }
        }
        Ok(())
    }

    /// Overlay raster size: `round(target × scale / 100)` per axis, floored at one pixel.
    pub fn pixel_size(&self, target: TargetSize) -> (u32, u32) {
        let (tw, th) = target.as_f64();
        let axis = |t: f64, scale: f64| -> u32 {
            let px = round_half_up(t * scale / NOMINAL).max(1.0);
            px.min(f64::from(u32::MAX)) as u32
        };
        (axis(tw, self.scale_x), axis(th, self.scale_y))
    }

    /// Offset in pixels, translated from the top-centre anchor.
    pub fn pixel_offset(&self, target: TargetSize) -> PixelOffset {
        let (tw, th) = target.as_f64();
        PixelOffset {
            x: round_half_up(self.offset_x / NOMINAL * tw) as i64,
            y: round_half_up(self.offset_y / NOMINAL * th) as i64,
        }
    }
}

/// Everything one render pass needs besides the source asset.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RenderParams {
    pub target: TargetSize,
    #[serde(default)]
    pub background: HexColor,
    #[serde(default)]
    pub crop: CropRect,
    #[serde(default)]
    pub overlay: Option<OverlayPlacement>,
    #[serde(default)]
    pub tone: ToneAdjust,
}

impl RenderParams {
    /// Defaults for everything but the target: white background, full frame, no overlay,
    /// neutral tone.
    pub fn new(target: TargetSize) -> Self {
        Self {
            target,
            background: HexColor::white(),
            crop: CropRect::FULL,
            overlay: None,
            tone: ToneAdjust::NEUTRAL,
        }
    }

    pub fn with_background(mut self, background: HexColor) -> Self {
        self.background = background;
        self
    }

    pub fn with_crop(mut self, crop: CropRect) -> Self {
        self.crop = crop;
        self
    }

    pub fn with_overlay(mut self, overlay: OverlayPlacement) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn with_tone(mut self, tone: ToneAdjust) -> Self {
        self.tone = tone;
        self
    }

    /// Re-check every field. Constructing through the wire request already does this, but
    /// values built in code go through here before the executor sees them.
    pub fn validate(&self) -> RenderResult<()> {
        TargetSize::new(self.target.width, self.target.height)?;
        self.crop.validate()?;
        self.tone.validate()?;
        if let Some(overlay) = &self.overlay {
            overlay.validate()?;
            let (w, h) = overlay.pixel_size(self.target);
            if w > MAX_DIMENSION || h > MAX_DIMENSION {
                return Err(RenderError::invalid_params(format!(
                    "overlay would be {w}x{h}px; edges are limited to {MAX_DIMENSION}px"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../tests/unit/params.rs"]
mod tests;
