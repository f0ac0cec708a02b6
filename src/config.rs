//! Runtime settings.
//!
//! Layering, lowest to highest precedence: built-in defaults, an optional JSON file, environment
//! variables, then command-line flags (applied by the binary).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;

use crate::exec::{MagickExecutor, NativeExecutor, RasterExecutor};
use crate::foundation::error::{RenderError, RenderResult};
use crate::pipeline::PipelineOptions;
use crate::remote::RemoteConfig;
use crate::remote::auth::{StaticTokenVerifier, TokenVerifier};

const ENV_PREFIX: &str = "PROFILEREADY_";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// External ImageMagick `magick` binary.
    #[default]
    Magick,
    /// In-process `image` crate executor (no PDF output).
    Native,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Settings {
    pub upload_dir: PathBuf,
    pub static_dir: PathBuf,
    pub overlay_dir: PathBuf,
    pub static_url_prefix: String,
    pub max_upload_mb: u64,
    pub preview_max_edge: u32,
    pub executor: ExecutorKind,
    pub magick_bin: PathBuf,
    pub executor_timeout_secs: Option<u64>,
    pub remote: Option<RemoteConfig>,
    /// JSON token → user id table for the development verifier.
    pub tokens: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        let opts = PipelineOptions::default();
        Self {
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
            overlay_dir: opts.overlay_dir,
            static_url_prefix: opts.static_url_prefix,
            max_upload_mb: opts.max_upload_bytes / (1024 * 1024),
            preview_max_edge: opts.preview_max_edge,
            executor: ExecutorKind::Magick,
            magick_bin: PathBuf::from("magick"),
            executor_timeout_secs: None,
            remote: None,
            tokens: None,
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> RenderResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RenderError::invalid_params(format!("{key}={value:?}: {e}")))
}

impl Settings {
    /// Defaults, then `file` if given, then the process environment.
    pub fn load(file: Option<&Path>) -> RenderResult<Self> {
        let mut settings = match file {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_json_file(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read settings '{}'", path.display()))?;
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("parse settings '{}'", path.display()))?;
        Ok(settings)
    }

    /// Overlay variables from `get`. Unprefixed `MAX_UPLOAD_MB` and `SUPABASE_*` are honoured
    /// for compatibility with existing deployments.
    pub fn apply_env(&mut self, get: impl Fn(&str) -> Option<String>) -> RenderResult<()> {
        let var = |name: &str| get(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("UPLOAD_DIR") {
            self.upload_dir = v.into();
        }
        if let Some(v) = var("STATIC_DIR") {
            self.static_dir = v.into();
        }
        if let Some(v) = var("OVERLAY_DIR") {
            self.overlay_dir = v.into();
        }
        if let Some(v) = var("STATIC_URL_PREFIX") {
            self.static_url_prefix = v;
        }
        if let Some(v) = var("MAX_UPLOAD_MB").or_else(|| get("MAX_UPLOAD_MB")) {
            self.max_upload_mb = parse_env("MAX_UPLOAD_MB", &v)?;
        }
        if let Some(v) = var("PREVIEW_MAX_EDGE") {
            self.preview_max_edge = parse_env("PREVIEW_MAX_EDGE", &v)?;
        }
        if let Some(v) = var("EXECUTOR") {
            self.executor = match v.trim().to_ascii_lowercase().as_str() {
                "magick" => ExecutorKind::Magick,
                "native" => ExecutorKind::Native,
                other => {
                    return Err(RenderError::invalid_params(format!(
                        "{ENV_PREFIX}EXECUTOR={other:?}: expected magick or native"
                    )));
                }
            };
        }
        if let Some(v) = var("MAGICK_BIN") {
            self.magick_bin = v.into();
        }
        if let Some(v) = var("EXECUTOR_TIMEOUT_SECS") {
            self.executor_timeout_secs = Some(parse_env("EXECUTOR_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("TOKENS") {
            self.tokens = Some(v.into());
        }

        let url = get("SUPABASE_URL").filter(|v| !v.trim().is_empty());
        let key = get("SUPABASE_SERVICE_ROLE_KEY").filter(|v| !v.trim().is_empty());
        if let (Some(url), Some(key)) = (url, key) {
            let ttl = self.remote.as_ref().map(|r| r.signed_url_ttl_secs);
            let mut remote = RemoteConfig::new(url, key);
            if let Some(ttl) = ttl {
                remote.signed_url_ttl_secs = ttl;
            }
            self.remote = Some(remote);
        }
        if let (Some(remote), Some(bucket)) = (
            self.remote.as_mut(),
            get("SUPABASE_BUCKET").filter(|v| !v.trim().is_empty()),
        ) {
            remote.bucket = bucket;
        }
        Ok(())
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            overlay_dir: self.overlay_dir.clone(),
            static_url_prefix: self.static_url_prefix.clone(),
            max_upload_bytes: self.max_upload_mb.saturating_mul(1024 * 1024),
            preview_max_edge: self.preview_max_edge,
        }
    }

    pub fn build_executor(&self) -> Box<dyn RasterExecutor> {
        match self.executor {
            ExecutorKind::Magick => Box::new(
                MagickExecutor::new(&self.magick_bin)
                    .with_timeout(self.executor_timeout_secs.map(Duration::from_secs)),
            ),
            ExecutorKind::Native => Box::new(NativeExecutor::new()),
        }
    }

    pub fn build_verifier(&self) -> RenderResult<Option<Arc<dyn TokenVerifier>>> {
        match &self.tokens {
            Some(path) => Ok(Some(Arc::new(StaticTokenVerifier::from_json_file(path)?))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
