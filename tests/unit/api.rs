use std::collections::HashMap;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};

use super::*;
use crate::exec::NativeExecutor;
use crate::foundation::core::TargetSize;
use crate::pipeline::PipelineOptions;
use crate::remote::auth::StaticTokenVerifier;
use crate::store::AssetStore;

fn service(dir: &std::path::Path) -> ApiService<NativeExecutor> {
    let store = AssetStore::open(dir.join("uploads"), dir.join("static")).unwrap();
    let pipeline = RenderPipeline::new(
        NativeExecutor::new().with_filter(FilterType::Nearest),
        store,
        PipelineOptions {
            overlay_dir: dir.join("overlays"),
            ..PipelineOptions::default()
        },
    );
    ApiService::new(pipeline)
}

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 20, 30, 255])))
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[test]
fn request_defaults_fill_absent_fields() {
    let req = RenderRequest::from_json(r#"{"assetId":"1_abc","size":"600x600"}"#).unwrap();
    let (id, params) = req.to_params().unwrap();
    assert_eq!(id.as_str(), "1_abc");
    assert_eq!(params, RenderParams::new(TargetSize::new(600, 600).unwrap()));
}

#[test]
fn request_accepts_form_strings_and_legacy_names() {
    let req = RenderRequest::from_json(
        r##"{
            "fileBase": "1_abc",
            "size": "750x975",
            "bgcolor": "#0a0B0c",
            "uniform": "mansuit",
            "uniformScaleX": "120",
            "uniformScaleY": 80,
            "uniformOffsetX": "-5",
            "uniformOffsetY": "",
            "cropX": "10", "cropY": 5, "cropW": "80", "cropH": "90",
            "brightness": "110", "contrast": 95
        }"##,
    )
    .unwrap();
    let (_, params) = req.to_params().unwrap();
    assert_eq!(params.target, TargetSize::new(750, 975).unwrap());
    assert_eq!(params.background.digits(), "0A0B0C");
    assert_eq!(params.crop.x, 10.0);
    assert_eq!(params.crop.height, 90.0);
    assert_eq!(params.tone.signed(), (10.0, -5.0));
    let overlay = params.overlay.unwrap();
    assert_eq!(overlay.overlay, Overlay::ManSuit);
    assert_eq!((overlay.scale_x, overlay.scale_y), (120.0, 80.0));
    assert_eq!((overlay.offset_x, overlay.offset_y), (-5.0, 0.0));
}

#[test]
fn request_validation_errors_are_specific() {
    let kind = |json: &str| {
        RenderRequest::from_json(json)
            .and_then(|r| r.to_params())
            .unwrap_err()
            .kind()
    };
    assert_eq!(kind(r#"{"size":"600x600"}"#), "invalid_params");
    assert_eq!(kind(r#"{"assetId":"1_a"}"#), "invalid_size");
    assert_eq!(kind(r#"{"assetId":"1_a","size":"huge"}"#), "invalid_size");
    assert_eq!(kind(r#"{"assetId":"1_a","size":"10x10","overlay":"cape"}"#), "overlay_not_found");
    assert_eq!(kind(r#"{"assetId":"1_a","size":"10x10","cropW":"abc"}"#), "invalid_params");
    assert_eq!(kind(r#"{"assetId":"1_a","size":"10x10","cropW":120}"#), "invalid_params");
    assert_eq!(kind(r#"{"assetId":"1_a","size":"10x10","bgcolor":"blue"}"#), "invalid_params");
    assert_eq!(kind(r#"{"assetId":"../x","size":"10x10"}"#), "not_found");
}

#[test]
fn none_overlay_means_no_composite() {
    let req = RenderRequest::from_json(r#"{"assetId":"1_a","size":"10x10","overlay":"none"}"#).unwrap();
    assert!(req.to_params().unwrap().1.overlay.is_none());
}

#[test]
fn error_statuses() {
    let cases = [
        (RenderError::no_file("x"), 400),
        (RenderError::invalid_size("x"), 400),
        (RenderError::unsupported_format("x"), 400),
        (RenderError::unauthorized("x"), 401),
        (RenderError::forbidden("x"), 403),
        (RenderError::not_found("x"), 404),
        (RenderError::overlay_not_found("x"), 404),
        (RenderError::payload_too_large("x"), 413),
        (RenderError::executor("x"), 500),
        (RenderError::remote_disabled("x"), 503),
        (RenderError::from(anyhow::anyhow!("disk")), 500),
    ];
    for (err, status) in cases {
        assert_eq!(status_code(&err), status, "{err}");
    }

    let api = ApiError::from(RenderError::unsupported_format("'bmp'"));
    assert_eq!(api.status, 400);
    assert_eq!(
        serde_json::to_value(&api.body).unwrap(),
        serde_json::json!({"error": "unsupported_format", "detail": "unsupported format: 'bmp'"})
    );
}

#[test]
fn presets_are_listed_with_dimensions() {
    let list = presets();
    assert_eq!(list.len(), SizePreset::ALL.len());
    assert_eq!(
        list[0],
        PresetInfo {
            name: "1000x1000",
            width: 1000,
            height: 1000
        }
    );
}

#[test]
fn upload_render_download_through_service() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());

    let up = svc.upload(&png_bytes(50, 40), Some("me.png")).unwrap();
    let req = RenderRequest {
        asset_id: Some(up.asset_id.clone()),
        size: Some("390x567".to_string()),
        ..RenderRequest::default()
    };
    let rendered = svc.render(&req).unwrap();
    assert!(rendered.preview_url.ends_with("-rendered.png"));

    let dl = svc
        .download(&DownloadQuery {
            asset_id: Some(rendered.new_asset_id.clone()),
            format: Some("jpg".to_string()),
        })
        .unwrap();
    assert_eq!(dl.content_type, "image/jpeg");
    assert_eq!(
        dl.content_disposition,
        format!("attachment; filename=\"{}.jpg\"", rendered.new_asset_id)
    );
    let img = image::load_from_memory(&dl.bytes).unwrap();
    assert_eq!((img.width(), img.height()), (390, 567));

    let err = svc
        .download(&DownloadQuery {
            asset_id: Some(rendered.new_asset_id),
            format: Some("gif".to_string()),
        })
        .unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(err.body.error, "unsupported_format");

    let err = svc.download(&DownloadQuery::default()).unwrap_err();
    assert_eq!(err.status, 400);
}

#[test]
fn sign_request_accepts_both_expiry_names() {
    let req: SignRequest =
        serde_json::from_str(r#"{"path":"users/a/x.png","expiresIn":60}"#).unwrap();
    assert_eq!(req.expires_in, Some(60));
    let req: SignRequest =
        serde_json::from_str(r#"{"path":"users/a/x.png","expiresInSeconds":120}"#).unwrap();
    assert_eq!(req.expires_in, Some(120));
    assert_eq!(req.path.as_deref(), Some("users/a/x.png"));
}

#[test]
fn user_endpoints_require_credentials_and_remote() {
    let dir = tempfile::tempdir().unwrap();
    let svc = service(dir.path());
    let req = SignRequest {
        path: Some("users/alice/x.png".to_string()),
        expires_in: None,
    };
    assert_eq!(svc.sign(Some("Bearer t"), &req).unwrap_err().status, 401);

    let verifier = StaticTokenVerifier::new(HashMap::from([("t".to_string(), "alice".to_string())]));
    let svc = svc.with_verifier(Some(Arc::new(verifier)));
    assert_eq!(svc.sign(None, &req).unwrap_err().status, 401);
    assert_eq!(svc.sign(Some("Bearer t"), &req).unwrap_err().status, 503);
    assert_eq!(
        svc.sign(Some("Bearer t"), &SignRequest::default())
            .unwrap_err()
            .status,
        400
    );
    assert_eq!(
        svc.upload_user_file(Some("Bearer t"), vec![1], "a.png", "image/png")
            .unwrap_err()
            .status,
        503
    );
}
