//! In-memory client implementation for development and tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::{ClientError, ObjectStorageClient, UploadResponse, UploadToken};

/// An object held by [`MemoryClient`].
#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    mime_type: String,
}

/// In-memory object storage client (development and tests only).
///
/// Objects live in a process-local map keyed by `(bucket, key)`. Upload
/// responses carry the hex SHA-256 of the payload as the content hash,
/// matching the hash-presence success contract of the real service.
///
/// Two switches simulate remote failure modes: [`set_fail_uploads`]
/// produces hash-less upload responses, and [`set_offline`] makes every
/// call fail as unreachable.
///
/// [`set_fail_uploads`]: MemoryClient::set_fail_uploads
/// [`set_offline`]: MemoryClient::set_offline
#[derive(Debug, Default)]
pub struct MemoryClient {
    objects: Mutex<HashMap<(String, String), StoredObject>>,
    token_counter: AtomicU64,
    fail_uploads: AtomicBool,
    offline: AtomicBool,
}

impl MemoryClient {
    /// Create an empty client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// When set, uploads return responses without a content hash.
    pub fn set_fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// When set, every call fails with [`ClientError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of upload tokens handed out so far.
    #[must_use]
    pub fn issued_tokens(&self) -> u64 {
        self.token_counter.load(Ordering::SeqCst)
    }

    /// Payload stored in `bucket` under `key`, if any.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// MIME type recorded for the object in `bucket` under `key`, if any.
    pub async fn mime_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.mime_type.clone())
    }

    /// Whether `bucket` holds an object under `key`.
    pub async fn contains(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .lock()
            .await
            .contains_key(&(bucket.to_string(), key.to_string()))
    }

    fn check_online(&self) -> Result<(), ClientError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ClientError::unavailable("memory client is offline"));
        }
        Ok(())
    }
}

impl ObjectStorageClient for MemoryClient {
    async fn generate_upload_token(&self, bucket: &str) -> Result<UploadToken, ClientError> {
        self.check_online()?;
        let n = self.token_counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(UploadToken::new(format!("dev-{bucket}-{n}")))
    }

    async fn upload_file(
        &self,
        _token: &UploadToken,
        local_path: &Path,
        mime_type: &str,
        bucket: &str,
        key: &str,
    ) -> Result<UploadResponse, ClientError> {
        self.check_online()?;

        let data = tokio::fs::read(local_path).await.map_err(|e| {
            ClientError::api(format!(
                "cannot read staged file {}: {e}",
                local_path.display()
            ))
        })?;

        if self.fail_uploads.load(Ordering::SeqCst) {
            return Ok(UploadResponse::default());
        }

        let hash = hex::encode(Sha256::digest(&data));
        self.objects.lock().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                mime_type: mime_type.to_string(),
            },
        );

        Ok(UploadResponse {
            hash: Some(hash),
            key: Some(key.to_string()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ClientError> {
        self.check_online()?;
        self.objects
            .lock()
            .await
            .remove(&(bucket.to_string(), key.to_string()))
            .map(|_| ())
            .ok_or_else(|| ClientError::not_found(bucket, key))
    }

    async fn move_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<(), ClientError> {
        self.check_online()?;
        let mut objects = self.objects.lock().await;
        let object = objects
            .remove(&(src_bucket.to_string(), src_key.to_string()))
            .ok_or_else(|| ClientError::not_found(src_bucket, src_key))?;
        objects.insert((dst_bucket.to_string(), dst_key.to_string()), object);
        Ok(())
    }
}
