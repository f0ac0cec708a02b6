//! Transport-agnostic request/response layer.
//!
//! Wire DTOs mirror the JSON the browser client sends and expects. [`ApiService`] turns them into
//! pipeline calls and maps every [`RenderError`] to an HTTP status plus an [`ErrorBody`], so an
//! HTTP front end only has to move bytes.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, de};

use crate::exec::RasterExecutor;
use crate::foundation::core::{CropRect, HexColor};
use crate::foundation::error::{RenderError, RenderResult};
use crate::params::{NOMINAL, OverlayPlacement, RenderParams, ToneAdjust};
use crate::pipeline::RenderPipeline;
use crate::remote::RemoteStore;
use crate::remote::auth::{self, SignedObject, TokenVerifier};
use crate::schema::{self, Overlay, SizePreset};
use crate::store::AssetId;

/// Numbers may arrive as JSON numbers or as form-encoded strings; blank strings mean "absent".
fn lenient_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(f64),
        Str(String),
    }

    match Option::<NumOrStr>::deserialize(d)? {
        None => Ok(None),
        Some(NumOrStr::Num(v)) => Ok(Some(v)),
        Some(NumOrStr::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(NumOrStr::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("'{s}' is not a number"))),
    }
}

/// Body of a render request.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderRequest {
    #[serde(default, alias = "fileBase")]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default, alias = "bgColor")]
    pub bgcolor: Option<String>,
    #[serde(default, alias = "uniform")]
    pub overlay: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "uniformScaleX")]
    pub overlay_scale_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "uniformScaleY")]
    pub overlay_scale_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "uniformOffsetX")]
    pub overlay_offset_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", alias = "uniformOffsetY")]
    pub overlay_offset_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub crop_x: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub crop_y: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub crop_w: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub crop_h: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub brightness: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub contrast: Option<f64>,
}

impl RenderRequest {
    pub fn from_json(text: &str) -> RenderResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| RenderError::invalid_params(format!("malformed render request: {e}")))
    }

    /// Resolve and validate into the asset to render and its parameters. Absent optional fields
    /// take their defaults; present ones must be in range.
    pub fn to_params(&self) -> RenderResult<(AssetId, RenderParams)> {
        let asset_id = match self.asset_id.as_deref().map(str::trim) {
            None | Some("") => return Err(RenderError::invalid_params("missing assetId")),
            Some(id) => AssetId::parse(id)?,
        };
        let size = self
            .size
            .as_deref()
            .ok_or_else(|| RenderError::invalid_size("missing size"))?;
        let target = schema::resolve_size(size)?;

        let background = HexColor::parse(self.bgcolor.as_deref().unwrap_or_default())?;
        let crop = CropRect {
            x: self.crop_x.unwrap_or(0.0),
            y: self.crop_y.unwrap_or(0.0),
            width: self.crop_w.unwrap_or(100.0),
            height: self.crop_h.unwrap_or(100.0),
        };
        let tone = ToneAdjust {
            brightness: self.brightness.unwrap_or(NOMINAL),
            contrast: self.contrast.unwrap_or(NOMINAL),
        };

        let mut params = RenderParams::new(target)
            .with_background(background)
            .with_crop(crop)
            .with_tone(tone);
        match self.overlay.as_deref().map(str::trim) {
            None | Some("") | Some("none") => {}
            Some(name) => {
                let overlay: Overlay = name.parse()?;
                params = params.with_overlay(OverlayPlacement {
                    overlay,
                    scale_x: self.overlay_scale_x.unwrap_or(NOMINAL),
                    scale_y: self.overlay_scale_y.unwrap_or(NOMINAL),
                    offset_x: self.overlay_offset_x.unwrap_or(0.0),
                    offset_y: self.overlay_offset_y.unwrap_or(0.0),
                });
            }
        }
        params.validate()?;
        Ok((asset_id, params))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub preview_url: String,
    pub asset_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResponse {
    pub preview_url: String,
    pub new_asset_id: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    #[serde(default, alias = "filename")]
    pub asset_id: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

/// Binary download with the headers it must be served with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadResponse {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub content_disposition: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default, alias = "expiresInSeconds")]
    pub expires_in: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct PresetInfo {
    pub name: &'static str,
    pub width: u32,
    pub height: u32,
}

/// JSON error payload: machine kind plus human detail.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{status} {}: {}", body.error, body.detail)]
pub struct ApiError {
    pub status: u16,
    pub body: ErrorBody,
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_code(err: &RenderError) -> u16 {
    match err {
        RenderError::NoFile(_)
        | RenderError::InvalidSize(_)
        | RenderError::InvalidParams(_)
        | RenderError::UnsupportedFormat(_) => 400,
        RenderError::Unauthorized(_) => 401,
        RenderError::Forbidden(_) => 403,
        RenderError::NotFound(_) | RenderError::OverlayNotFound(_) => 404,
        RenderError::PayloadTooLarge(_) => 413,
        RenderError::RemoteDisabled(_) => 503,
        RenderError::Executor(_) | RenderError::RemoteStorage(_) | RenderError::Other(_) => 500,
    }
}

impl From<RenderError> for ApiError {
    fn from(err: RenderError) -> Self {
        let status = status_code(&err);
        if status >= 500 {
            tracing::error!(error = %err, kind = err.kind(), "request failed");
        } else {
            tracing::debug!(error = %err, kind = err.kind(), "request rejected");
        }
        Self {
            status,
            body: ErrorBody {
                error: err.kind().to_string(),
                detail: format!("{err:#}"),
            },
        }
    }
}

pub fn content_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{file_name}\"")
}

pub fn presets() -> Vec<PresetInfo> {
    SizePreset::ALL
        .into_iter()
        .map(|p| {
            let (width, height) = p.dimensions();
            PresetInfo {
                name: p.as_str(),
                width,
                height,
            }
        })
        .collect()
}

/// Endpoint handlers over one pipeline and its optional collaborators.
pub struct ApiService<E> {
    pipeline: RenderPipeline<E>,
    verifier: Option<Arc<dyn TokenVerifier>>,
    remote: Option<Arc<dyn RemoteStore>>,
}

impl<E: RasterExecutor> ApiService<E> {
    pub fn new(pipeline: RenderPipeline<E>) -> Self {
        Self {
            pipeline,
            verifier: None,
            remote: None,
        }
    }

    pub fn with_verifier(mut self, verifier: Option<Arc<dyn TokenVerifier>>) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_remote(mut self, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        self.remote = remote;
        self
    }

    pub fn pipeline(&self) -> &RenderPipeline<E> {
        &self.pipeline
    }

    pub fn upload(&self, bytes: &[u8], file_name: Option<&str>) -> ApiResult<UploadResponse> {
        let out = self.pipeline.process_upload(bytes, file_name)?;
        Ok(UploadResponse {
            preview_url: out.preview_url,
            asset_id: out.asset_id.to_string(),
        })
    }

    pub fn render(&self, req: &RenderRequest) -> ApiResult<RenderResponse> {
        let (asset_id, params) = req.to_params()?;
        let out = self.pipeline.render(&asset_id, &params)?;
        Ok(RenderResponse {
            preview_url: out.preview_url,
            new_asset_id: out.asset_id.to_string(),
        })
    }

    pub fn download(&self, query: &DownloadQuery) -> ApiResult<DownloadResponse> {
        let asset_id = query
            .asset_id
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RenderError::invalid_params("missing assetId"))?;
        let format = query.format.as_deref().unwrap_or("png");
        let dl = self.pipeline.convert(asset_id, format)?;
        Ok(DownloadResponse {
            content_type: dl.content_type(),
            content_disposition: content_disposition(&dl.file_name),
            bytes: dl.bytes,
        })
    }

    fn identity(&self, authorization: Option<&str>) -> RenderResult<auth::Identity> {
        let verifier = self
            .verifier
            .as_deref()
            .ok_or_else(|| RenderError::unauthorized("no token verifier configured"))?;
        auth::authenticate(verifier, authorization)
    }

    /// Authenticated upload into the caller's own remote prefix.
    pub fn upload_user_file(
        &self,
        authorization: Option<&str>,
        bytes: Vec<u8>,
        file_name: &str,
        content_type: &str,
    ) -> ApiResult<SignedObject> {
        let identity = self.identity(authorization)?;
        Ok(auth::upload_user_file(
            self.remote.as_deref(),
            &identity,
            file_name,
            bytes,
            content_type,
            None,
        )?)
    }

    pub fn sign(&self, authorization: Option<&str>, req: &SignRequest) -> ApiResult<SignedObject> {
        let identity = self.identity(authorization)?;
        let path = req
            .path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| RenderError::invalid_params("missing path"))?;
        Ok(auth::sign_user_path(
            self.remote.as_deref(),
            &identity,
            path,
            req.expires_in.map(Duration::from_secs),
        )?)
    }
}

#[cfg(test)]
#[path = "../tests/unit/api.rs"]
mod tests;
