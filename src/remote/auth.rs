//! Authenticated, user-scoped remote uploads and signed URLs.
//!
//! A caller is identified by a bearer credential. Everything a user uploads lands under
//! `users/{uid}/`, and a user may only mint URLs for objects under that prefix.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::foundation::error::{RenderError, RenderResult};
use crate::remote::RemoteStore;

pub const DEFAULT_USER_URL_TTL: Duration = Duration::from_secs(3600);

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> RenderResult<&str> {
    let header = header.ok_or_else(|| RenderError::unauthorized("missing authorization header"))?;
    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| RenderError::unauthorized("malformed authorization header"))?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(RenderError::unauthorized(format!(
            "unsupported authorization scheme '{scheme}'"
        )));
    }
    let token = token.trim();
    if token.is_empty() {
        return Err(RenderError::unauthorized("empty bearer token"));
    }
    Ok(token)
}

/// Stable identity a credential resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    user_id: String,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> RenderResult<Self> {
        let user_id = user_id.into();
        if user_id.is_empty()
            || !user_id
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(RenderError::unauthorized("credential resolved to an unusable user id"));
        }
        Ok(Self { user_id })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Object prefix owned by this user, with trailing slash.
    pub fn prefix(&self) -> String {
        format!("users/{}/", self.user_id)
    }
}

pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> RenderResult<Identity>;
}

/// Verifier backed by a fixed token → user id table, loaded from JSON
/// (`{"token": "user-id", ...}`). Intended for development and tests.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }

    pub fn from_json_file(path: &Path) -> RenderResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read token table '{}'", path.display()))?;
        let tokens: HashMap<String, String> = serde_json::from_str(&text)
            .with_context(|| format!("parse token table '{}'", path.display()))?;
        Ok(Self::new(tokens))
    }
}

impl TokenVerifier for StaticTokenVerifier {
    fn verify(&self, token: &str) -> RenderResult<Identity> {
        match self.tokens.get(token) {
            Some(uid) => Identity::new(uid.clone()),
            None => Err(RenderError::unauthorized("unknown or expired token")),
        }
    }
}

/// Resolve an `Authorization` header value to an identity.
pub fn authenticate(verifier: &dyn TokenVerifier, header: Option<&str>) -> RenderResult<Identity> {
    verifier.verify(bearer_token(header)?)
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedObject {
    pub path: String,
    pub signed_url: String,
}

/// Store `bytes` under the caller's prefix and return the object path with a signed URL.
#[tracing::instrument(skip(remote, bytes), fields(user = identity.user_id(), len = bytes.len()))]
pub fn upload_user_file(
    remote: Option<&dyn RemoteStore>,
    identity: &Identity,
    file_name: &str,
    bytes: Vec<u8>,
    content_type: &str,
    ttl: Option<Duration>,
) -> RenderResult<SignedObject> {
    let remote = remote.ok_or_else(|| RenderError::remote_disabled("remote storage is not configured"))?;
    if bytes.is_empty() {
        return Err(RenderError::no_file("no file uploaded"));
    }
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let path = format!(
        "{}{millis}_{}",
        identity.prefix(),
        sanitize_file_name(file_name)
    );
    remote.upload(&path, bytes, content_type)?;
    let signed_url = remote.signed_url(&path, ttl.unwrap_or(DEFAULT_USER_URL_TTL))?;
    Ok(SignedObject { path, signed_url })
}

/// Mint a signed URL for an object the caller owns.
pub fn sign_user_path(
    remote: Option<&dyn RemoteStore>,
    identity: &Identity,
    object_path: &str,
    ttl: Option<Duration>,
) -> RenderResult<SignedObject> {
    let remote = remote.ok_or_else(|| RenderError::remote_disabled("remote storage is not configured"))?;
    let path = object_path.trim_start_matches('/');
    let prefix = identity.prefix();
    let inside = path
        .strip_prefix(&prefix)
        .is_some_and(|rest| !rest.is_empty() && !rest.split('/').any(|seg| seg.is_empty() || seg == ".." || seg == "."));
    if !inside {
        return Err(RenderError::forbidden(format!(
            "'{path}' is outside '{prefix}'"
        )));
    }
    let signed_url = remote.signed_url(path, ttl.unwrap_or(DEFAULT_USER_URL_TTL))?;
    Ok(SignedObject {
        path: path.to_string(),
        signed_url,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/remote/auth.rs"]
mod tests;
