//! Error types shared across the crate.

use thiserror::Error;

/// Boxed error produced by a wrapped cache backend.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An argument was rejected before any I/O was attempted.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        name: &'static str,
        reason: &'static str,
    },

    /// The cache was used after disposal started.
    #[error("adaptive TTL cache has been disposed")]
    Disposed,

    /// Failure raised by the wrapped cache, passed through untouched.
    #[error(transparent)]
    Backend(BoxError),
}

impl CacheError {
    /// Wrap a backend failure.
    pub fn backend(err: impl Into<BoxError>) -> Self {
        Self::Backend(err.into())
    }

    /// Reject an empty key.
    pub(crate) fn empty_key() -> Self {
        Self::InvalidArgument {
            name: "key",
            reason: "must not be empty",
        }
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("`{field}` out of range: {reason}")]
    OutOfRange { field: &'static str, reason: String },

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("unknown strategy `{0}` (expected `rule-based` or `weighted`)")]
    UnknownStrategy(String),
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, reason: impl Into<String>) -> Self {
        Self::OutOfRange {
            field,
            reason: reason.into(),
        }
    }
}

/// Validate a key before it reaches any collaborator.
pub(crate) fn check_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() {
        return Err(CacheError::empty_key());
    }
    Ok(())
}
