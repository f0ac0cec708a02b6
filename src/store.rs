//! On-disk asset store.
//!
//! Originals live in the upload directory as `{id}-original{ext}`; previews and renders live in
//! the static directory as `{id}-preview.png` and `{id}-rendered.png`. Intermediate rasters for a
//! render are `{id}-{tag}.png` in the upload directory and are removed when the render finishes.
//!
//! Lookups go through an exact identifier index first. Files written by an earlier process are
//! found by scanning, and the scan result is deterministic (greatest matching name wins).

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Context as _;

use crate::foundation::error::{RenderError, RenderResult};

const MAX_ID_LEN: usize = 128;

/// Extensions kept for uploaded originals; anything else is stored as `.png`.
const KNOWN_EXTENSIONS: [&str; 9] = [
    "png", "jpg", "jpeg", "gif", "webp", "bmp", "tif", "tiff", "heic",
];

/// Opaque asset identifier: `{unix_millis:013}_{8 hex}`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AssetId(String);

impl AssetId {
    pub fn generate() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{millis:013}_{}", &suffix[..8]))
    }

    /// Accept a caller-supplied identifier. Only `[A-Za-z0-9_-]` is allowed, so an identifier can
    /// never name a path outside the store.
    pub fn parse(s: &str) -> RenderResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(RenderError::not_found("missing asset id"));
        }
        if s.len() > MAX_ID_LEN
            || !s
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return Err(RenderError::not_found(format!("'{s}' is not a valid asset id")));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for AssetId {
    type Error = RenderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<AssetId> for String {
    fn from(value: AssetId) -> Self {
        value.0
    }
}

/// Role of a stored raster, encoded in its file name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetRole {
    Original,
    Preview,
    Rendered,
}

impl AssetRole {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Original => "original",
            Self::Preview => "preview",
            Self::Rendered => "rendered",
        }
    }
}

/// Pick the stored extension (with leading dot) for an uploaded file name.
pub fn original_extension(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|ext| KNOWN_EXTENSIONS.contains(&ext.as_str()))
        .map_or_else(|| ".png".to_string(), |ext| format!(".{ext}"))
}

/// Entries kept in the in-memory path index before it is reset.
pub const INDEX_CAPACITY: usize = 4096;

#[derive(Debug)]
pub struct AssetStore {
    upload_dir: PathBuf,
    static_dir: PathBuf,
    index: Mutex<HashMap<(AssetId, AssetRole), PathBuf>>,
}

impl AssetStore {
    /// Open (creating if needed) the upload and static directories.
    pub fn open(upload_dir: impl Into<PathBuf>, static_dir: impl Into<PathBuf>) -> RenderResult<Self> {
        let upload_dir = upload_dir.into();
        let static_dir = static_dir.into();
        for dir in [&upload_dir, &static_dir] {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("create asset directory '{}'", dir.display()))?;
        }
        Ok(Self {
            upload_dir,
            static_dir,
            index: Mutex::new(HashMap::new()),
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn static_dir(&self) -> &Path {
        &self.static_dir
    }

    /// Persist uploaded bytes as a new `original` asset.
    pub fn save_original(&self, bytes: &[u8], file_name: Option<&str>) -> RenderResult<(AssetId, PathBuf)> {
        let id = AssetId::generate();
        let ext = original_extension(file_name);
        let path = self
            .upload_dir
            .join(format!("{id}-{}{ext}", AssetRole::Original.suffix()));
        std::fs::write(&path, bytes)
            .with_context(|| format!("write original '{}'", path.display()))?;
        self.register(&id, AssetRole::Original, &path);
        Ok((id, path))
    }

    /// Where a derived raster of `role` for `id` lives. Originals keep their upload extension and
    /// are resolved through [`AssetStore::original_path`] instead.
    pub fn derived_path(&self, id: &AssetId, role: AssetRole) -> PathBuf {
        self.static_dir.join(format!("{id}-{}.png", role.suffix()))
    }

    /// Scratch raster scoped to one render call.
    pub fn scratch_path(&self, id: &AssetId, tag: &str) -> PathBuf {
        self.upload_dir.join(format!("{id}-{tag}.png"))
    }

    /// Remember where `id`'s `role` file lives. The index is a lookup cache over the directories:
    /// once it holds [`INDEX_CAPACITY`] entries it is cleared, and later lookups fall back to a
    /// directory scan.
    pub fn register(&self, id: &AssetId, role: AssetRole, path: &Path) {
        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        if index.len() >= INDEX_CAPACITY && !index.contains_key(&(id.clone(), role)) {
            tracing::debug!(entries = index.len(), "asset index full; clearing");
            index.clear();
        }
        index.insert((id.clone(), role), path.to_path_buf());
    }

    fn indexed(&self, id: &AssetId, role: AssetRole) -> Option<PathBuf> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(id.clone(), role))
            .filter(|p| p.is_file())
            .cloned()
    }

    /// Resolve the stored original for `id`.
    pub fn original_path(&self, id: &AssetId) -> RenderResult<PathBuf> {
        if let Some(path) = self.indexed(id, AssetRole::Original) {
            return Ok(path);
        }
        let prefix = format!("{id}-{}", AssetRole::Original.suffix());
        let found = scan_greatest(&self.upload_dir, |name| {
            name.strip_prefix(&prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
        })?;
        match found {
            Some(path) => {
                self.register(id, AssetRole::Original, &path);
                Ok(path)
            }
            None => Err(RenderError::not_found(format!("original file for '{id}'"))),
        }
    }

    /// Resolve the most recent served raster for `id`: the rendered file if there is one, the
    /// preview otherwise. Only the exact `{id}-{role}.png` names are considered, so an id never
    /// resolves to another asset sharing its prefix.
    pub fn latest_served(&self, id: &AssetId) -> RenderResult<PathBuf> {
        for role in [AssetRole::Rendered, AssetRole::Preview] {
            if let Some(path) = self.indexed(id, role) {
                return Ok(path);
            }
            let path = self.derived_path(id, role);
            if path.is_file() {
                return Ok(path);
            }
        }
        Err(RenderError::not_found(format!("no stored raster for '{id}'")))
    }

    /// Remove a file, logging instead of failing.
    pub fn remove_best_effort(&self, path: &Path) {
        remove_best_effort(path);
    }
}

pub(crate) fn remove_best_effort(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "could not delete file"),
    }
}

/// Greatest file name in `dir` accepted by `accept`. Names start with a zero-padded timestamp, so
/// the greatest name is also the newest.
fn scan_greatest(dir: &Path, accept: impl Fn(&str) -> bool) -> RenderResult<Option<PathBuf>> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("list '{}'", dir.display()))?;
    let mut best: Option<String> = None;
    for entry in entries {
        let entry = entry.with_context(|| format!("list '{}'", dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if !accept(&name) || !entry.path().is_file() {
            continue;
        }
        if best.as_ref().is_none_or(|b| name > *b) {
            best = Some(name);
        }
    }
    Ok(best.map(|name| dir.join(name)))
}

#[cfg(test)]
#[path = "../tests/unit/store.rs"]
mod tests;
