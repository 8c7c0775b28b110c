//! Client error types.

use thiserror::Error;

/// Remote storage client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Service or transport unreachable.
    #[error("storage service unreachable: {0}")]
    Unavailable(String),

    /// Object absent from the bucket.
    #[error("object not found: {bucket}/{key}")]
    NotFound {
        /// Bucket that was queried.
        bucket: String,
        /// Storage key that was not found.
        key: String,
    },

    /// The call reached the service but was rejected or failed.
    #[error("storage API error: {0}")]
    Api(String),
}

impl ClientError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create an API error.
    #[must_use]
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }
}
