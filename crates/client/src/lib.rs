//! Object storage client boundary for kodo-attach.
//!
//! The storage backend talks to the remote object store exclusively through
//! the [`ObjectStorageClient`] trait defined here: upload-token generation,
//! file upload, and object deletion. A production deployment plugs in a
//! client backed by the vendor SDK; [`MemoryClient`] provides an in-memory
//! implementation for development and tests.

mod error;
mod memory;

pub use error::ClientError;
pub use memory::MemoryClient;

use std::path::Path;

/// Short-lived authorization credential scoped to a bucket.
///
/// Tokens are opaque to callers and are never persisted; a fresh one is
/// requested whenever none is cached for the current operation scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadToken(String);

impl UploadToken {
    /// Wrap a raw token string issued by the remote service.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Remote response to an upload request.
///
/// The service signals a successful upload by echoing a content hash for
/// the stored object; a response without one must be treated as a failure
/// by the caller.
#[derive(Debug, Clone, Default)]
pub struct UploadResponse {
    /// Content hash (etag) of the stored object, present on success.
    pub hash: Option<String>,
    /// Storage key the object was stored under, as reported by the service.
    pub key: Option<String>,
}

impl UploadResponse {
    /// Whether the response carries the success indicator.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.hash.is_some()
    }
}

/// Remote object-storage contract consumed by the storage backend.
///
/// Implementations own authentication (credentials are supplied at
/// construction time) and the service's timeout/cancellation behavior;
/// every method is a single network round trip with no internal retries.
///
/// A `move_object` operation is part of the remote surface but the storage
/// backend deliberately never calls it: uploads are stored under generated
/// immutable keys, so display-filename renames have no remote side effect.
pub trait ObjectStorageClient: Send + Sync {
    /// Request an upload token scoped to `bucket`.
    fn generate_upload_token(
        &self,
        bucket: &str,
    ) -> impl std::future::Future<Output = Result<UploadToken, ClientError>> + Send;

    /// Upload the file at `local_path` to `bucket` under `key`.
    fn upload_file(
        &self,
        token: &UploadToken,
        local_path: &Path,
        mime_type: &str,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<UploadResponse, ClientError>> + Send;

    /// Delete the object stored in `bucket` under `key`.
    fn delete_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;

    /// Move an object between keys, possibly across buckets.
    fn move_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> impl std::future::Future<Output = Result<(), ClientError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_response_success_requires_hash() {
        let missing = UploadResponse::default();
        assert!(!missing.is_success());

        let present = UploadResponse {
            hash: Some("abc123".to_string()),
            key: Some("photos/1/cat.png".to_string()),
        };
        assert!(present.is_success());
    }

    #[test]
    fn test_upload_token_roundtrip() {
        let token = UploadToken::new("dev-bucket-1");
        assert_eq!(token.as_str(), "dev-bucket-1");
    }
}
