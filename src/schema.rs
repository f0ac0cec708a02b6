//! Enumerations shared by the editor and the server.
//!
//! Size presets and the overlay catalogue used to be two string tables kept in lockstep by hand.
//! Both sides now resolve names through these types.

use std::fmt;
use std::str::FromStr;

use crate::foundation::core::TargetSize;
use crate::foundation::error::{RenderError, RenderResult};

/// Named output sizes offered by the settings page.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SizePreset {
    #[serde(rename = "1000x1000")]
    Square1000,
    #[serde(rename = "750x975")]
    Portrait750x975,
    #[serde(rename = "900x1200")]
    Portrait900x1200,
    #[serde(rename = "1200x1500")]
    Portrait1200x1500,
    #[serde(rename = "1524x1905")]
    Portrait1524x1905,
    #[serde(rename = "1200x1800")]
    Portrait1200x1800,
    #[serde(rename = "1080x1080")]
    Square1080,
    #[serde(rename = "600x600")]
    Square600,
    #[serde(rename = "390x567")]
    Portrait390x567,
    #[serde(rename = "450x600")]
    Portrait450x600,
}

impl SizePreset {
    pub const ALL: [Self; 10] = [
        Self::Square1000,
        Self::Portrait750x975,
        Self::Portrait900x1200,
        Self::Portrait1200x1500,
        Self::Portrait1524x1905,
        Self::Portrait1200x1800,
        Self::Square1080,
        Self::Square600,
        Self::Portrait390x567,
        Self::Portrait450x600,
    ];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Square1000 => (1000, 1000),
            Self::Portrait750x975 => (750, 975),
            Self::Portrait900x1200 => (900, 1200),
            Self::Portrait1200x1500 => (1200, 1500),
            Self::Portrait1524x1905 => (1524, 1905),
            Self::Portrait1200x1800 => (1200, 1800),
            Self::Square1080 => (1080, 1080),
            Self::Square600 => (600, 600),
            Self::Portrait390x567 => (390, 567),
            Self::Portrait450x600 => (450, 600),
        }
    }

    pub fn size(self) -> TargetSize {
        let (width, height) = self.dimensions();
        TargetSize { width, height }
    }

    /// The wire name, identical to the `WIDTHxHEIGHT` spelling.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square1000 => "1000x1000",
            Self::Portrait750x975 => "750x975",
            Self::Portrait900x1200 => "900x1200",
            Self::Portrait1200x1500 => "1200x1500",
            Self::Portrait1524x1905 => "1524x1905",
            Self::Portrait1200x1800 => "1200x1800",
            Self::Square1080 => "1080x1080",
            Self::Square600 => "600x600",
            Self::Portrait390x567 => "390x567",
            Self::Portrait450x600 => "450x600",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == name)
    }
}

impl fmt::Display for SizePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolve a `size` field: a preset name first, then a free-form `WIDTHxHEIGHT`.
pub fn resolve_size(size: &str) -> RenderResult<TargetSize> {
    match SizePreset::from_name(size) {
        Some(preset) => Ok(preset.size()),
        None => TargetSize::parse(size),
    }
}

/// Garment overlays composited over the rendered portrait.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overlay {
    #[serde(rename = "womensuit")]
    WomenSuit,
    #[serde(rename = "mansuit")]
    ManSuit,
    BoysSchoolUniform,
    GirlsSchoolUniform,
    MensUniversityUniform,
    WomensUniversityUniform,
}

impl Overlay {
    pub const ALL: [Self; 6] = [
        Self::WomenSuit,
        Self::ManSuit,
        Self::BoysSchoolUniform,
        Self::GirlsSchoolUniform,
        Self::MensUniversityUniform,
        Self::WomensUniversityUniform,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WomenSuit => "womensuit",
            Self::ManSuit => "mansuit",
            Self::BoysSchoolUniform => "boys-school-uniform",
            Self::GirlsSchoolUniform => "girls-school-uniform",
            Self::MensUniversityUniform => "mens-university-uniform",
            Self::WomensUniversityUniform => "womens-university-uniform",
        }
    }

    /// File name of the overlay raster inside the overlay directory.
    pub fn file_name(self) -> &'static str {
        match self {
            Self::WomenSuit => "womensuit.png",
            Self::ManSuit => "mansuit.png",
            Self::BoysSchoolUniform => "boy's-school-uniform.png",
            Self::GirlsSchoolUniform => "girl's-school-uniform.png",
            Self::MensUniversityUniform => "men's-university-uniform.png",
            Self::WomensUniversityUniform => "women's-university-uniform.png",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|o| o.as_str() == name)
    }
}

impl fmt::Display for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Overlay {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| RenderError::overlay_not_found(format!("unknown overlay '{s}'")))
    }
}

/// Download formats accepted by `convert`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Png,
    Jpeg,
    Pdf,
}

impl OutputFormat {
    /// Canonical file extension (`jpeg` downloads are written as `.jpg`).
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Pdf => "pdf",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Pdf => "application/pdf",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "pdf" => Ok(Self::Pdf),
            other => Err(RenderError::unsupported_format(format!(
                "'{other}' (expected png, jpg, jpeg or pdf)"
            ))),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/schema.rs"]
mod tests;
