use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use super::*;
use crate::exec::NativeExecutor;
use crate::params::OverlayPlacement;

/// Native executor that counts jobs.
struct Counting {
    inner: NativeExecutor,
    jobs: AtomicUsize,
}

impl RasterExecutor for Counting {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn execute(&self, job: &RasterJob) -> RenderResult<()> {
        self.jobs.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(job)
    }
}

struct FailingRemote;

impl RemoteStore for FailingRemote {
    fn upload(&self, _: &str, _: Vec<u8>, _: &str) -> RenderResult<()> {
        Err(RenderError::remote("connection refused"))
    }

    fn signed_url(&self, _: &str, _: Duration) -> RenderResult<String> {
        Err(RenderError::remote("connection refused"))
    }
}

#[derive(Default)]
struct MemoryRemote {
    paths: Mutex<Vec<String>>,
}

impl RemoteStore for MemoryRemote {
    fn upload(&self, object_path: &str, _: Vec<u8>, _: &str) -> RenderResult<()> {
        self.paths.lock().unwrap().push(object_path.to_string());
        Ok(())
    }

    fn signed_url(&self, object_path: &str, _: Duration) -> RenderResult<String> {
        Ok(format!("https://remote/{object_path}?token=t"))
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    pipeline: RenderPipeline<Counting>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = AssetStore::open(dir.path().join("uploads"), dir.path().join("static")).unwrap();
        let overlay_dir = dir.path().join("overlays");
        std::fs::create_dir_all(&overlay_dir).unwrap();
        RgbaImage::from_pixel(20, 20, Rgba([255, 0, 0, 255]))
            .save(overlay_dir.join(Overlay::ManSuit.file_name()))
            .unwrap();
        let opts = PipelineOptions {
            overlay_dir,
            max_upload_bytes: 1024 * 1024,
            ..PipelineOptions::default()
        };
        let exec = Counting {
            inner: NativeExecutor::new().with_filter(FilterType::Nearest),
            jobs: AtomicUsize::new(0),
        };
        Self {
            dir,
            pipeline: RenderPipeline::new(exec, store, opts),
        }
    }

    fn jobs(&self) -> usize {
        self.pipeline.executor().jobs.load(Ordering::SeqCst)
    }

    fn upload_gray(&self, w: u32, h: u32) -> UploadOutcome {
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([128, 128, 128, 255])))
            .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        self.pipeline.process_upload(&bytes, Some("photo.png")).unwrap()
    }

    fn upload_listing(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.pipeline.store().upload_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[test]
fn upload_writes_original_and_bounded_preview() {
    let fx = Fixture::new();
    let out = fx.upload_gray(1200, 800);
    assert_eq!(out.preview_url, format!("/static/{}-preview.png", out.asset_id));

    let preview = fx.pipeline.store().derived_path(&out.asset_id, AssetRole::Preview);
    assert_eq!(image::image_dimensions(&preview).unwrap(), (600, 400));
    assert!(fx.pipeline.store().original_path(&out.asset_id).is_ok());
}

#[test]
fn upload_rejects_empty_and_oversized_payloads() {
    let fx = Fixture::new();
    assert_eq!(
        fx.pipeline.process_upload(&[], None).unwrap_err().kind(),
        "no_file"
    );
    let big = vec![0u8; 1024 * 1024 + 1];
    assert_eq!(
        fx.pipeline.process_upload(&big, None).unwrap_err().kind(),
        "payload_too_large"
    );
    assert_eq!(fx.jobs(), 0);
}

#[test]
fn render_without_overlay_hits_target_and_cleans_up() {
    let fx = Fixture::new();
    let up = fx.upload_gray(300, 200);
    let params = RenderParams::new(TargetSize::new(90, 120).unwrap());
    let out = fx.pipeline.render(&up.asset_id, &params).unwrap();

    assert_ne!(out.asset_id, up.asset_id);
    let rendered = fx.pipeline.store().derived_path(&out.asset_id, AssetRole::Rendered);
    assert_eq!(image::image_dimensions(&rendered).unwrap(), (90, 120));
    assert_eq!(out.preview_url, format!("/static/{}-rendered.png", out.asset_id));
    // Only the original is left in the upload directory.
    assert_eq!(fx.upload_listing().len(), 1);
}

#[test]
fn render_with_overlay_places_it_top_centre() {
    let fx = Fixture::new();
    let up = fx.upload_gray(100, 100);
    let mut placement = OverlayPlacement::new(Overlay::ManSuit);
    placement.scale_x = 20.0;
    placement.scale_y = 10.0;
    placement.offset_y = 50.0;
    let params = RenderParams::new(TargetSize::new(100, 100).unwrap()).with_overlay(placement);
    let out = fx.pipeline.render(&up.asset_id, &params).unwrap();

    let img = image::open(fx.pipeline.store().derived_path(&out.asset_id, AssetRole::Rendered))
        .unwrap()
        .into_rgba8();
    // 20x10 overlay, left edge at 50 - 10 = 40, top at 50.
    assert_eq!(img.get_pixel(40, 50).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(59, 59).0, [255, 0, 0, 255]);
    assert_eq!(img.get_pixel(39, 50).0, [128, 128, 128, 255]);
    assert_eq!(img.get_pixel(40, 60).0, [128, 128, 128, 255]);
    assert_eq!(fx.upload_listing().len(), 1);
}

#[test]
fn unknown_asset_fails_before_any_work() {
    let fx = Fixture::new();
    let id = AssetId::parse("1700000000000_00000000").unwrap();
    let params = RenderParams::new(TargetSize::new(10, 10).unwrap());
    assert_eq!(
        fx.pipeline.render(&id, &params).unwrap_err().kind(),
        "not_found"
    );
    assert_eq!(fx.jobs(), 0);
    assert!(fx.upload_listing().is_empty());
}

#[test]
fn missing_overlay_file_fails_before_executor() {
    let fx = Fixture::new();
    let up = fx.upload_gray(10, 10);
    let before = fx.jobs();
    let params = RenderParams::new(TargetSize::new(10, 10).unwrap())
        .with_overlay(OverlayPlacement::new(Overlay::WomenSuit));
    assert_eq!(
        fx.pipeline.render(&up.asset_id, &params).unwrap_err().kind(),
        "overlay_not_found"
    );
    assert_eq!(fx.jobs(), before);
}

#[test]
fn invalid_params_fail_before_executor() {
    let fx = Fixture::new();
    let up = fx.upload_gray(10, 10);
    let before = fx.jobs();
    let mut params = RenderParams::new(TargetSize::new(10, 10).unwrap());
    params.crop.width = 150.0;
    assert_eq!(
        fx.pipeline.render(&up.asset_id, &params).unwrap_err().kind(),
        "invalid_params"
    );
    assert_eq!(fx.jobs(), before);
}

#[test]
fn convert_rejects_unknown_format_without_executor() {
    let fx = Fixture::new();
    let up = fx.upload_gray(10, 10);
    let before = fx.jobs();
    let err = fx.pipeline.convert(up.asset_id.as_str(), "bmp").unwrap_err();
    assert_eq!(err.kind(), "unsupported_format");
    assert_eq!(fx.jobs(), before);
}

#[test]
fn convert_prefers_latest_render_and_names_the_attachment() {
    let fx = Fixture::new();
    let up = fx.upload_gray(40, 40);
    let dl = fx.pipeline.convert(up.asset_id.as_str(), "jpeg").unwrap();
    assert_eq!(dl.content_type(), "image/jpeg");
    assert_eq!(dl.file_name, format!("{}.jpg", up.asset_id));
    assert_eq!(&dl.bytes[..2], &[0xFF, 0xD8]);

    let out = fx
        .pipeline
        .render(&up.asset_id, &RenderParams::new(TargetSize::new(30, 20).unwrap()))
        .unwrap();
    let dl = fx.pipeline.convert(out.asset_id.as_str(), "PNG").unwrap();
    let decoded = image::load_from_memory(&dl.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (30, 20));

    assert_eq!(
        fx.pipeline.convert("1_nothing", "png").unwrap_err().kind(),
        "not_found"
    );
}

#[test]
fn remote_failure_falls_back_to_local_url() {
    let fx = Fixture::new();
    let store = AssetStore::open(fx.dir.path().join("u2"), fx.dir.path().join("s2")).unwrap();
    let pipeline = RenderPipeline::new(
        NativeExecutor::new().with_filter(FilterType::Nearest),
        store,
        fx.pipeline.options().clone(),
    )
    .with_remote(Some(Arc::new(FailingRemote)), Duration::from_secs(60));

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let up = pipeline.process_upload(&bytes, None).unwrap();
    assert!(up.preview_url.starts_with("/static/"));

    let out = pipeline
        .render(&up.asset_id, &RenderParams::new(TargetSize::new(8, 8).unwrap()))
        .unwrap();
    assert!(out.preview_url.starts_with("/static/"));
}

#[test]
fn remote_success_returns_signed_url_and_keeps_local_file() {
    let fx = Fixture::new();
    let remote = Arc::new(MemoryRemote::default());
    let store = AssetStore::open(fx.dir.path().join("u3"), fx.dir.path().join("s3")).unwrap();
    let pipeline = RenderPipeline::new(
        NativeExecutor::new().with_filter(FilterType::Nearest),
        store,
        fx.pipeline.options().clone(),
    )
    .with_remote(Some(remote.clone()), Duration::from_secs(60));

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 255])))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    let up = pipeline.process_upload(&bytes, None).unwrap();
    assert_eq!(
        up.preview_url,
        format!("https://remote/previews/{}-preview.png?token=t", up.asset_id)
    );
    let out = pipeline
        .render(&up.asset_id, &RenderParams::new(TargetSize::new(8, 8).unwrap()))
        .unwrap();
    assert_eq!(
        remote.paths.lock().unwrap().last().unwrap(),
        &format!("renders/{}-rendered.png", out.asset_id)
    );
    assert!(pipeline.convert(out.asset_id.as_str(), "png").is_ok());
}
