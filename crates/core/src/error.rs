//! Backend error types.

use thiserror::Error;

/// Storage backend errors.
///
/// Setup-time failures ([`Configuration`], [`DependencyUnavailable`]) are
/// fatal: no backend becomes usable. Per-operation failures propagate to
/// the caller unmodified; the backend never retries or swallows them.
///
/// [`Configuration`]: BackendError::Configuration
/// [`DependencyUnavailable`]: BackendError::DependencyUnavailable
#[derive(Debug, Error)]
pub enum BackendError {
    /// Configuration file missing, unparsable, or incomplete.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Record state violates an operation precondition.
    #[error("invalid record state: {0}")]
    InvalidRecord(String),

    /// Remote upload failed or the response lacked a success indicator.
    #[error("upload failed for key {key}: {reason}")]
    Upload {
        /// Storage key the upload targeted.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// Remote deletion failed or the object was absent.
    #[error("delete failed for key {key}: {reason}")]
    Delete {
        /// Storage key the deletion targeted.
        key: String,
        /// What went wrong.
        reason: String,
    },

    /// Remote client or service unreachable at setup or call time.
    #[error("storage dependency unavailable: {0}")]
    DependencyUnavailable(String),
}

impl BackendError {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid record error.
    #[must_use]
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create an upload error.
    #[must_use]
    pub fn upload(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Upload {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a delete error.
    #[must_use]
    pub fn delete(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Delete {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a dependency unavailable error.
    #[must_use]
    pub fn dependency_unavailable(msg: impl Into<String>) -> Self {
        Self::DependencyUnavailable(msg.into())
    }
}
