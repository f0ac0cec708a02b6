//! Profileready renders profile portraits from an uploaded photo.
//!
//! The server side is a [`RenderPipeline`]: it stores the original, derives a preview, and turns
//! a [`RenderParams`] bundle (crop, target size, background, optional overlay, tone) into a new
//! rendered asset by driving a [`RasterExecutor`] through a fixed operation chain. The client
//! side is an [`Editor`] over an [`EditHistory`] of [`EditState`] snapshots.
//!
//! - [`MagickExecutor`] shells out to ImageMagick; [`NativeExecutor`] runs in process.
//! - [`api`] holds the wire DTOs and the error-to-status mapping.
//! - [`remote`] optionally mirrors results to object storage and mints signed URLs.
#![forbid(unsafe_code)]

mod foundation;

/// Wire DTOs, status mapping and endpoint handlers.
pub mod api;
/// Runtime settings.
pub mod config;
/// Raster executors.
pub mod exec;
/// Edit history and editor state.
pub mod history;
pub mod params;
/// Render pipeline.
pub mod pipeline;
pub mod remote;
/// Size presets, overlays and output formats shared by client and server.
pub mod schema;
pub mod store;

pub use crate::foundation::core::{CropRect, HexColor, MAX_DIMENSION, PixelOffset, TargetSize};
pub use crate::foundation::error::{RenderError, RenderResult};

pub use crate::api::{ApiError, ApiService, ErrorBody, RenderRequest};
pub use crate::config::{ExecutorKind, Settings};
pub use crate::exec::{Gravity, MagickExecutor, NativeExecutor, RasterExecutor, RasterJob, RasterOp};
pub use crate::history::{EditHistory, EditState, EditSurface, Editor};
pub use crate::params::{OverlayPlacement, RenderParams, ToneAdjust};
pub use crate::pipeline::{Download, PipelineOptions, RenderOutcome, RenderPipeline, UploadOutcome};
pub use crate::remote::{RemoteConfig, RemoteStore, SupabaseStore};
pub use crate::schema::{OutputFormat, Overlay, SizePreset};
pub use crate::store::{AssetId, AssetRole, AssetStore};
