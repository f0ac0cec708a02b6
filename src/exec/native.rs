use std::io::Cursor;
use std::path::Path;

use anyhow::Context as _;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder as _, ImageFormat, ImageReader, RgbaImage};

use crate::exec::composite::{flatten, over_straight};
use crate::exec::{Gravity, RasterExecutor, RasterJob, RasterOp};
use crate::foundation::core::{MAX_DIMENSION, Rect, TargetSize};
use crate::foundation::error::{RenderError, RenderResult};

/// In-process executor backed by the `image` crate.
///
/// Covers every [`RasterOp`] and writes PNG or JPEG depending on the output extension. PDF output
/// is only available through [`MagickExecutor`](crate::exec::MagickExecutor).
#[derive(Clone, Debug)]
pub struct NativeExecutor {
    filter: FilterType,
}

impl Default for NativeExecutor {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
        }
    }
}

impl NativeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: FilterType) -> Self {
        self.filter = filter;
        self
    }

    fn apply(&self, img: RgbaImage, orientation: Orientation, op: &RasterOp) -> RenderResult<RgbaImage> {
        let (w, h) = img.dimensions();
        let out = match op {
            RasterOp::AutoOrient => {
                let mut dynamic = DynamicImage::ImageRgba8(img);
                dynamic.apply_orientation(orientation);
                dynamic.into_rgba8()
            }
            RasterOp::CropPercent(crop) if crop.is_full_frame() => img,
            RasterOp::CropPercent(crop) => {
                let r = crop.to_pixels(w, h);
                image::imageops::crop_imm(
                    &img,
                    r.x0 as u32,
                    r.y0 as u32,
                    r.width() as u32,
                    r.height() as u32,
                )
                .to_image()
            }
            // Cropped buffers already start at their own origin.
            RasterOp::ResetPage => img,
            RasterOp::ResizeFill(size) => {
                let (nw, nh) = scaled_dims(w, h, fill_scale(w, h, *size));
                if nw > MAX_DIMENSION || nh > MAX_DIMENSION {
                    return Err(RenderError::executor(format!(
                        "fill of {w}x{h} into {size} needs a {nw}x{nh} intermediate; follow it \
                         with an extent of the same size"
                    )));
                }
                image::imageops::resize(&img, nw, nh, self.filter)
            }
            RasterOp::ResizeExact(size) => {
                image::imageops::resize(&img, size.width, size.height, self.filter)
            }
            RasterOp::ShrinkToFit(max) => {
                if w <= max.width && h <= max.height {
                    img
                } else {
                    let scale = (f64::from(max.width) / f64::from(w))
                        .min(f64::from(max.height) / f64::from(h));
                    let (nw, nh) = scaled_dims(w, h, scale);
                    image::imageops::resize(&img, nw, nh, self.filter)
                }
            }
            RasterOp::Extent {
                size,
                background,
                gravity,
            } => {
                let [r, g, b] = background.rgb();
                let mut canvas = RgbaImage::from_pixel(size.width, size.height, image::Rgba([r, g, b, 255]));
                let origin = gravity.origin((size.width, size.height), (w, h));
                blit_over(&mut canvas, &img, origin);
                canvas
            }
            RasterOp::BrightnessContrast {
                brightness,
                contrast,
            } => {
                let mut img = img;
                brightness_contrast(&mut img, *brightness, *contrast);
                img
            }
            RasterOp::CompositeOver {
                overlay,
                gravity,
                offset,
            } => {
                let (layer, _) = load(overlay)?;
                let origin = gravity.origin((w, h), layer.dimensions());
                let mut img = img;
                blit_over(&mut img, &layer, (origin.0 + offset.x, origin.1 + offset.y));
                img
            }
        };
        Ok(out)
    }
}

impl NativeExecutor {
    /// `ResizeFill(size)` immediately followed by an extent to the same `size`.
    ///
    /// Only the part of the source that survives the extent is resized, straight to `size`, so
    /// the intermediate never exceeds the target however extreme the aspect ratio.
    fn fill_window(&self, img: &RgbaImage, size: TargetSize, gravity: Gravity) -> RgbaImage {
        let (w, h) = img.dimensions();
        let scale = fill_scale(w, h, size);
        let (nw, nh) = scaled_dims(w, h, scale);
        let (ox, oy) = gravity.origin((size.width, size.height), (nw, nh));

        let window = Rect::new(
            -ox as f64 / scale,
            -oy as f64 / scale,
            (f64::from(size.width) - ox as f64) / scale,
            (f64::from(size.height) - oy as f64) / scale,
        )
        .round()
        .intersect(Rect::new(0.0, 0.0, f64::from(w), f64::from(h)));
        let span = |lo: f64, hi: f64, len: u32| {
            let start = (lo.max(0.0) as u32).min(len - 1);
            let end = (hi.max(0.0) as u32).clamp(start + 1, len);
            (start, end - start)
        };
        let (cx, cw) = span(window.x0, window.x1, w);
        let (cy, ch) = span(window.y0, window.y1, h);

        let visible = image::imageops::crop_imm(img, cx, cy, cw, ch).to_image();
        image::imageops::resize(&visible, size.width, size.height, self.filter)
    }
}

impl RasterExecutor for NativeExecutor {
    fn name(&self) -> &'static str {
        "native"
    }

    fn execute(&self, job: &RasterJob) -> RenderResult<()> {
        // Reject unsupported outputs before decoding anything.
        let format = output_format(&job.output)?;
        let (mut img, orientation) = load(&job.input)?;
        let mut ops = job.ops.iter().peekable();
        while let Some(op) = ops.next() {
            img = match (op, ops.peek()) {
                (RasterOp::ResizeFill(fill), Some(RasterOp::Extent { size, gravity, .. }))
                    if fill == size =>
                {
                    self.fill_window(&img, *fill, *gravity)
                }
                _ => self.apply(img, orientation, op)?,
            };
            tracing::trace!(?op, width = img.width(), height = img.height(), "native op");
        }
        save(&img, &job.output, format)
    }
}

/// Uniform scale at which a `w`×`h` image covers `size` on both axes.
fn fill_scale(w: u32, h: u32, size: TargetSize) -> f64 {
    (f64::from(size.width) / f64::from(w)).max(f64::from(size.height) / f64::from(h))
}

fn scaled_dims(w: u32, h: u32, scale: f64) -> (u32, u32) {
    let axis = |v: u32| ((f64::from(v) * scale).round().max(1.0)).min(f64::from(u32::MAX)) as u32;
    (axis(w), axis(h))
}

fn load(path: &Path) -> RenderResult<(RgbaImage, Orientation)> {
    let reader = ImageReader::open(path)
        .map_err(|e| RenderError::executor(format!("open '{}': {e}", path.display())))?
        .with_guessed_format()
        .map_err(|e| RenderError::executor(format!("probe '{}': {e}", path.display())))?;
    let mut decoder = reader
        .into_decoder()
        .map_err(|e| RenderError::executor(format!("decode '{}': {e}", path.display())))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let img = DynamicImage::from_decoder(decoder)
        .map_err(|e| RenderError::executor(format!("decode '{}': {e}", path.display())))?
        .into_rgba8();
    if img.width() == 0 || img.height() == 0 {
        return Err(RenderError::executor(format!(
            "'{}' has no pixels",
            path.display()
        )));
    }
    Ok((img, orientation))
}

fn output_format(path: &Path) -> RenderResult<ImageFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok(ImageFormat::Png),
        "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
        "pdf" => Err(RenderError::executor(
            "pdf output requires the magick executor",
        )),
        other => Err(RenderError::executor(format!(
            "native executor cannot write '.{other}' files"
        ))),
    }
}

fn save(img: &RgbaImage, path: &Path, format: ImageFormat) -> RenderResult<()> {
    let mut buf = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel; flatten onto white.
            let rgb = image::RgbImage::from_fn(img.width(), img.height(), |x, y| {
                image::Rgb(flatten(img.get_pixel(x, y).0, [255, 255, 255]))
            });
            DynamicImage::ImageRgb8(rgb)
                .write_to(&mut Cursor::new(&mut buf), format)
                .map_err(|e| RenderError::executor(format!("encode jpeg: {e}")))?;
        }
        _ => {
            img.write_to(&mut Cursor::new(&mut buf), format)
                .map_err(|e| RenderError::executor(format!("encode {format:?}: {e}")))?;
        }
    }
    std::fs::write(path, &buf)
        .with_context(|| format!("write '{}'", path.display()))?;
    Ok(())
}

/// Composite `layer` onto `canvas` with its top-left corner at `origin`, clipping to the canvas.
fn blit_over(canvas: &mut RgbaImage, layer: &RgbaImage, origin: (i64, i64)) {
    let bounds = Rect::new(0.0, 0.0, f64::from(canvas.width()), f64::from(canvas.height()));
    let placed = Rect::new(
        origin.0 as f64,
        origin.1 as f64,
        origin.0 as f64 + f64::from(layer.width()),
        origin.1 as f64 + f64::from(layer.height()),
    );
    let visible = bounds.intersect(placed);
    if visible.is_zero_area() {
        return;
    }

    for y in visible.y0 as i64..visible.y1 as i64 {
        for x in visible.x0 as i64..visible.x1 as i64 {
            let src = layer.get_pixel((x - origin.0) as u32, (y - origin.1) as u32).0;
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            dst.0 = over_straight(dst.0, src);
        }
    }
}

/// ImageMagick's `-brightness-contrast` transfer: a linear ramp whose slope comes from the
/// contrast and whose intercept comes from the brightness, applied to color channels only.
fn brightness_contrast(img: &mut RgbaImage, brightness: f64, contrast: f64) {
    if brightness == 0.0 && contrast == 0.0 {
        return;
    }
    let slope = (std::f64::consts::PI * (contrast / 100.0 + 1.0) / 4.0)
        .tan()
        .max(0.0);
    let intercept = brightness / 100.0 + ((100.0 - brightness) / 200.0) * (1.0 - slope);

    let mut lut = [0u8; 256];
    for (i, slot) in lut.iter_mut().enumerate() {
        let v = slope * (i as f64 / 255.0) + intercept;
        *slot = (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
    for px in img.pixels_mut() {
        px.0[0] = lut[usize::from(px.0[0])];
        px.0[1] = lut[usize::from(px.0[1])];
        px.0[2] = lut[usize::from(px.0[2])];
    }
}

#[cfg(test)]
#[path = "../../tests/unit/exec/native.rs"]
mod tests;
