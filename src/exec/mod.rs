//! Raster operation executor boundary.
//!
//! A [`RasterJob`] is one input file, an ordered list of [`RasterOp`]s and one output file. The
//! output format follows the output path's extension. Executors run the job to completion before
//! returning; callers treat `execute` as a blocking suspension point.

use std::path::PathBuf;

use crate::foundation::core::{CropRect, HexColor, PixelOffset, TargetSize};
use crate::foundation::error::RenderResult;

pub(crate) mod composite;
/// External `magick` process executor.
pub mod magick;
/// In-process executor built on the `image` crate.
pub mod native;

pub use magick::MagickExecutor;
pub use native::NativeExecutor;

/// Anchor used when placing one raster inside or over another.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gravity {
    /// Centred horizontally, flush with the top edge.
    North,
}

impl Gravity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::North => "north",
        }
    }

    /// Top-left corner of a `layer` placed on a `canvas` with this gravity, before any offset.
    ///
    /// Halves are truncated separately, matching how ImageMagick adjusts gravity geometry.
    pub fn origin(self, canvas: (u32, u32), layer: (u32, u32)) -> (i64, i64) {
        let half = |c: u32, l: u32| i64::from(c / 2) - i64::from(l / 2);
        match self {
            Self::North => (half(canvas.0, layer.0), 0),
        }
    }
}

/// One named raster operation.
#[derive(Clone, Debug, PartialEq)]
pub enum RasterOp {
    /// Apply EXIF orientation and clear it.
    AutoOrient,
    /// Crop a rectangle given in percent of the current image.
    CropPercent(CropRect),
    /// Forget any virtual canvas offset left by a crop.
    ResetPage,
    /// Scale preserving aspect ratio so the image covers `size` on both axes.
    ResizeFill(TargetSize),
    /// Scale to exactly `size`, ignoring aspect ratio.
    ResizeExact(TargetSize),
    /// Scale down preserving aspect ratio to fit within `max`; never enlarges.
    ShrinkToFit(TargetSize),
    /// Place the image on a `size` canvas filled with `background`.
    Extent {
        size: TargetSize,
        background: HexColor,
        gravity: Gravity,
    },
    /// Signed brightness/contrast in `[-100, 100]`.
    BrightnessContrast { brightness: f64, contrast: f64 },
    /// Alpha-over composite of another raster file onto the current image.
    CompositeOver {
        overlay: PathBuf,
        gravity: Gravity,
        offset: PixelOffset,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct RasterJob {
    pub input: PathBuf,
    pub ops: Vec<RasterOp>,
    pub output: PathBuf,
}

impl RasterJob {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            ops: Vec::new(),
            output: output.into(),
        }
    }

    pub fn op(mut self, op: RasterOp) -> Self {
        self.ops.push(op);
        self
    }
}

/// Black-box raster engine. Failures come back as [`RenderError::Executor`].
///
/// [`RenderError::Executor`]: crate::RenderError::Executor
pub trait RasterExecutor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Run `job`, writing `job.output`.
    fn execute(&self, job: &RasterJob) -> RenderResult<()>;
}

impl<E: RasterExecutor + ?Sized> RasterExecutor for Box<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, job: &RasterJob) -> RenderResult<()> {
        (**self).execute(job)
    }
}

impl<E: RasterExecutor + ?Sized> RasterExecutor for std::sync::Arc<E> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn execute(&self, job: &RasterJob) -> RenderResult<()> {
        (**self).execute(job)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/mod.rs"]
mod tests;
