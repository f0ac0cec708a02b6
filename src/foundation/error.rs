pub type RenderResult<T> = Result<T, RenderError>;

/// Error taxonomy shared by the render pipeline, the asset store and the remote collaborators.
///
/// Each variant maps to a short machine-checkable kind (see [`RenderError::kind`]) plus a
/// human-readable detail string.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("no file: {0}")]
    NoFile(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid size: {0}")]
    InvalidSize(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("overlay not found: {0}")]
    OverlayNotFound(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("remote storage error: {0}")]
    RemoteStorage(String),

    #[error("remote storage disabled: {0}")]
    RemoteDisabled(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RenderError {
    pub fn no_file(msg: impl Into<String>) -> Self {
        Self::NoFile(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_size(msg: impl Into<String>) -> Self {
        Self::InvalidSize(msg.into())
    }

    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    pub fn overlay_not_found(msg: impl Into<String>) -> Self {
        Self::OverlayNotFound(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn payload_too_large(msg: impl Into<String>) -> Self {
        Self::PayloadTooLarge(msg.into())
    }

    pub fn executor(msg: impl Into<String>) -> Self {
        Self::Executor(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::RemoteStorage(msg.into())
    }

    pub fn remote_disabled(msg: impl Into<String>) -> Self {
        Self::RemoteDisabled(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    /// Stable machine-readable kind, used as the `error` field of wire error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoFile(_) => "no_file",
            Self::NotFound(_) => "not_found",
            Self::InvalidSize(_) => "invalid_size",
            Self::InvalidParams(_) => "invalid_params",
            Self::OverlayNotFound(_) => "overlay_not_found",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Executor(_) => "executor",
            Self::RemoteStorage(_) => "remote_storage",
            Self::RemoteDisabled(_) => "remote_disabled",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::Other(_) => "internal",
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
