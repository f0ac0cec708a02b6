//! Server-side render pipeline.
//!
//! Each call runs a strictly sequential chain of executor jobs; step N's output is step N+1's
//! input. Concurrent calls never share files because every call works under a fresh
//! [`AssetId`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::exec::{Gravity, RasterExecutor, RasterJob, RasterOp};
use crate::foundation::core::TargetSize;
use crate::foundation::error::{RenderError, RenderResult};
use crate::params::RenderParams;
use crate::remote::{self, RemoteStore};
use crate::schema::{Overlay, OutputFormat};
use crate::store::{self, AssetId, AssetRole, AssetStore};

#[derive(Clone, Debug)]
pub struct PipelineOptions {
    pub overlay_dir: PathBuf,
    /// URL prefix under which the static directory is served.
    pub static_url_prefix: String,
    pub max_upload_bytes: u64,
    /// Longest edge of upload previews; previews are never enlarged.
    pub preview_max_edge: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            overlay_dir: PathBuf::from("overlays"),
            static_url_prefix: "/static".to_string(),
            max_upload_bytes: 10 * 1024 * 1024,
            preview_max_edge: 600,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadOutcome {
    pub asset_id: AssetId,
    pub preview_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderOutcome {
    pub asset_id: AssetId,
    pub preview_url: String,
}

/// Transcoded bytes ready to stream as an attachment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub file_name: String,
}

impl Download {
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}

/// Files scoped to one call. Everything still listed on drop is removed.
#[derive(Default)]
struct Scratch {
    paths: Vec<PathBuf>,
}

impl Scratch {
    fn track(&mut self, path: &Path) -> PathBuf {
        self.paths.push(path.to_path_buf());
        path.to_path_buf()
    }

    fn keep(&mut self, path: &Path) {
        self.paths.retain(|p| p != path);
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        for path in &self.paths {
            store::remove_best_effort(path);
        }
    }
}

pub struct RenderPipeline<E> {
    exec: E,
    store: AssetStore,
    opts: PipelineOptions,
    remote: Option<Arc<dyn RemoteStore>>,
    remote_ttl: Duration,
}

impl<E: RasterExecutor> RenderPipeline<E> {
    pub fn new(exec: E, store: AssetStore, opts: PipelineOptions) -> Self {
        Self {
            exec,
            store,
            opts,
            remote: None,
            remote_ttl: Duration::from_secs(remote::DEFAULT_SIGNED_URL_TTL_SECS),
        }
    }

    /// Push previews and renders to `remote` and answer with signed URLs.
    pub fn with_remote(mut self, remote: Option<Arc<dyn RemoteStore>>, ttl: Duration) -> Self {
        self.remote = remote;
        self.remote_ttl = ttl;
        self
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn executor(&self) -> &E {
        &self.exec
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.opts
    }

    /// Persist an uploaded original and derive its preview.
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len(), exec = self.exec.name()))]
    pub fn process_upload(&self, bytes: &[u8], file_name: Option<&str>) -> RenderResult<UploadOutcome> {
        if bytes.is_empty() {
            return Err(RenderError::no_file("no file uploaded"));
        }
        if bytes.len() as u64 > self.opts.max_upload_bytes {
            return Err(RenderError::payload_too_large(format!(
                "{} bytes exceeds the {} byte limit",
                bytes.len(),
                self.opts.max_upload_bytes
            )));
        }

        let (id, original) = self.store.save_original(bytes, file_name)?;
        let preview = self.store.derived_path(&id, AssetRole::Preview);
        let edge = TargetSize::new(self.opts.preview_max_edge, self.opts.preview_max_edge)?;

        let mut scratch = Scratch::default();
        scratch.track(&preview);
        self.exec.execute(
            &RasterJob::new(&original, &preview)
                .op(RasterOp::AutoOrient)
                .op(RasterOp::ShrinkToFit(edge)),
        )?;
        scratch.keep(&preview);
        self.store.register(&id, AssetRole::Preview, &preview);
        tracing::debug!(%id, "preview written");

        let preview_url = self.served_url(&preview, "previews");
        Ok(UploadOutcome {
            asset_id: id,
            preview_url,
        })
    }

    /// Crop, fill, pad, tone-adjust and optionally composite the original behind `asset_id`
    /// into a new `rendered` asset.
    #[tracing::instrument(skip(self, params), fields(exec = self.exec.name(), target = %params.target))]
    pub fn render(&self, asset_id: &AssetId, params: &RenderParams) -> RenderResult<RenderOutcome> {
        let original = self.store.original_path(asset_id)?;
        params.validate()?;
        let overlay_file = params
            .overlay
            .as_ref()
            .map(|o| self.overlay_path(o.overlay))
            .transpose()?;

        let id = AssetId::generate();
        let target = params.target;
        let mut scratch = Scratch::default();

        let base = scratch.track(&self.store.scratch_path(&id, "base"));
        let (brightness, contrast) = params.tone.signed();
        self.exec.execute(
            &RasterJob::new(&original, &base)
                .op(RasterOp::AutoOrient)
                .op(RasterOp::CropPercent(params.crop))
                .op(RasterOp::ResetPage)
                .op(RasterOp::ResizeFill(target))
                .op(RasterOp::Extent {
                    size: target,
                    background: params.background.clone(),
                    gravity: Gravity::North,
                })
                .op(RasterOp::BrightnessContrast {
                    brightness,
                    contrast,
                }),
        )?;
        tracing::debug!(%id, "base written");

        let rendered = scratch.track(&self.store.derived_path(&id, AssetRole::Rendered));
        match (params.overlay.as_ref(), overlay_file) {
            (Some(placement), Some(file)) => {
                let resized = scratch.track(&self.store.scratch_path(&id, "overlay"));
                let (width, height) = placement.pixel_size(target);
                self.exec.execute(
                    &RasterJob::new(&file, &resized)
                        .op(RasterOp::ResizeExact(TargetSize { width, height })),
                )?;
                self.exec.execute(&RasterJob::new(&base, &rendered).op(RasterOp::CompositeOver {
                    overlay: resized,
                    gravity: Gravity::North,
                    offset: placement.pixel_offset(target),
                }))?;
                tracing::debug!(%id, overlay = %placement.overlay, width, height, "overlay composited");
            }
            _ => {
                std::fs::copy(&base, &rendered)
                    .with_context(|| format!("copy '{}' to '{}'", base.display(), rendered.display()))?;
            }
        }
        scratch.keep(&rendered);
        drop(scratch);
        self.store.register(&id, AssetRole::Rendered, &rendered);

        let preview_url = self.served_url(&rendered, "renders");
        tracing::info!(source = %asset_id, rendered = %id, "render complete");
        Ok(RenderOutcome {
            asset_id: id,
            preview_url,
        })
    }

    /// Transcode the most recent served raster for `asset_id` into `format`.
    #[tracing::instrument(skip(self), fields(exec = self.exec.name()))]
    pub fn convert(&self, asset_id: &str, format: &str) -> RenderResult<Download> {
        let format: OutputFormat = format.parse()?;
        let id = AssetId::parse(asset_id)?;
        let source = self.store.latest_served(&id)?;

        let scratch_dir = tempfile::Builder::new()
            .prefix("profileready-")
            .tempdir()
            .context("create scratch directory")?;
        let out = scratch_dir.path().join(format!("{id}.{}", format.extension()));
        self.exec.execute(&RasterJob::new(&source, &out))?;
        let bytes = std::fs::read(&out).with_context(|| format!("read '{}'", out.display()))?;
        if let Err(e) = scratch_dir.close() {
            tracing::warn!(error = %e, "could not delete scratch directory");
        }

        Ok(Download {
            bytes,
            format,
            file_name: format!("{id}.{}", format.extension()),
        })
    }

    pub fn overlay_path(&self, overlay: Overlay) -> RenderResult<PathBuf> {
        let path = self.opts.overlay_dir.join(overlay.file_name());
        if !path.is_file() {
            return Err(RenderError::overlay_not_found(format!(
                "'{overlay}' expects '{}'",
                path.display()
            )));
        }
        Ok(path)
    }

    /// URL under which the static directory serves `path`.
    pub fn local_url(&self, path: &Path) -> String {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{}/{name}", self.opts.static_url_prefix.trim_end_matches('/'))
    }

    /// Signed remote URL when a remote store is configured and reachable, local URL otherwise.
    /// The local file is kept in both cases.
    fn served_url(&self, path: &Path, folder: &str) -> String {
        let local = self.local_url(path);
        let Some(remote) = self.remote.as_deref() else {
            return local;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let object = format!("{folder}/{name}");
        match remote::publish(remote, path, &object, self.remote_ttl) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(error = %e, object = %object, "remote upload failed; serving locally");
                local
            }
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/pipeline.rs"]
mod tests;
