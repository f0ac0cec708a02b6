//! Optional remote object storage for finished assets.
//!
//! Remote persistence never decides whether a render succeeds: the pipeline treats every error
//! from this module as a reason to fall back to the locally served path.

use std::path::Path;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use anyhow::Context as _;

use crate::foundation::error::{RenderError, RenderResult};

pub mod auth;

pub const DEFAULT_BUCKET: &str = "user-uploads";
pub const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 24 * 60 * 60;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn default_bucket() -> String {
    DEFAULT_BUCKET.to_string()
}

fn default_ttl() -> u64 {
    DEFAULT_SIGNED_URL_TTL_SECS
}

/// Connection settings for a Supabase-compatible storage endpoint.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RemoteConfig {
    pub url: String,
    pub service_key: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_ttl")]
    pub signed_url_ttl_secs: u64,
}

impl RemoteConfig {
    pub fn new(url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            service_key: service_key.into(),
            bucket: default_bucket(),
            signed_url_ttl_secs: default_ttl(),
        }
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }
}

/// Object storage that can hold a blob and hand out a time-limited URL for it.
pub trait RemoteStore: Send + Sync {
    fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str) -> RenderResult<()>;

    fn signed_url(&self, object_path: &str, ttl: Duration) -> RenderResult<String>;
}

/// Upload a local file and return a signed URL for it.
pub fn publish(
    remote: &dyn RemoteStore,
    local: &Path,
    object_path: &str,
    ttl: Duration,
) -> RenderResult<String> {
    let bytes = std::fs::read(local)
        .with_context(|| format!("read '{}' for upload", local.display()))?;
    remote.upload(object_path, bytes, content_type_for(local))?;
    remote.signed_url(object_path, ttl)
}

/// Content type inferred from a file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Supabase storage REST client.
#[derive(Debug)]
pub struct SupabaseStore {
    client: reqwest::blocking::Client,
    config: RemoteConfig,
}

#[derive(serde::Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: String,
}

impl SupabaseStore {
    pub fn new(config: RemoteConfig) -> RenderResult<Self> {
        if config.url.trim().is_empty() || config.service_key.trim().is_empty() {
            return Err(RenderError::remote_disabled(
                "remote storage needs both a url and a service key",
            ));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RenderError::remote(format!("build http client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn storage_base(&self) -> String {
        format!("{}/storage/v1", self.config.url.trim_end_matches('/'))
    }

    pub fn object_url(&self, object_path: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.storage_base(),
            self.config.bucket,
            object_path.trim_start_matches('/')
        )
    }

    pub fn sign_endpoint(&self, object_path: &str) -> String {
        format!(
            "{}/object/sign/{}/{}",
            self.storage_base(),
            self.config.bucket,
            object_path.trim_start_matches('/')
        )
    }

    /// The sign endpoint answers with a path relative to the storage API root.
    pub fn absolutize(&self, signed: &str) -> String {
        if signed.starts_with("http://") || signed.starts_with("https://") {
            signed.to_string()
        } else {
            format!("{}/{}", self.storage_base(), signed.trim_start_matches('/'))
        }
    }
}

impl RemoteStore for SupabaseStore {
    #[tracing::instrument(skip(self, bytes), fields(len = bytes.len()))]
    fn upload(&self, object_path: &str, bytes: Vec<u8>, content_type: &str) -> RenderResult<()> {
        let resp = self
            .client
            .post(self.object_url(object_path))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .map_err(|e| RenderError::remote(format!("upload '{object_path}': {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(RenderError::remote(format!(
                "upload '{object_path}' returned {status}: {}",
                body.trim()
            )));
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    fn signed_url(&self, object_path: &str, ttl: Duration) -> RenderResult<String> {
        let resp = self
            .client
            .post(self.sign_endpoint(object_path))
            .bearer_auth(&self.config.service_key)
            .header("apikey", &self.config.service_key)
            .json(&serde_json::json!({ "expiresIn": ttl.as_secs() }))
            .send()
            .map_err(|e| RenderError::remote(format!("sign '{object_path}': {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            return Err(RenderError::remote(format!(
                "sign '{object_path}' returned {status}"
            )));
        }
        let signed: SignResponse = resp
            .json()
            .map_err(|e| RenderError::remote(format!("sign '{object_path}': bad response: {e}")))?;
        Ok(self.absolutize(&signed.signed_url))
    }
}

static SHARED: OnceLock<Option<Arc<dyn RemoteStore>>> = OnceLock::new();

/// Process-wide remote store, built on first use.
///
/// Only the first call's configuration is used; later calls return the same instance (or
/// `None`). A configuration that cannot produce a client is logged once and leaves remote
/// persistence disabled for the life of the process.
pub fn shared(config: Option<&RemoteConfig>) -> Option<Arc<dyn RemoteStore>> {
    SHARED
        .get_or_init(|| {
            let config = config?;
            match SupabaseStore::new(config.clone()) {
                Ok(store) => {
                    tracing::info!(url = %config.url, bucket = %config.bucket, "remote storage enabled");
                    Some(Arc::new(store) as Arc<dyn RemoteStore>)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "remote storage disabled");
                    None
                }
            }
        })
        .clone()
}

#[cfg(test)]
#[path = "../../tests/unit/remote/mod.rs"]
mod tests;
