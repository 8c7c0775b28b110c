//! Storage backend: per-record save-lifecycle operations.

use std::sync::Arc;

use kodo_attach_client::{ClientError, ObjectStorageClient, UploadToken};
use tracing::debug;

use crate::config::BackendConfig;
use crate::error::BackendError;
use crate::key::{join_key, pad_path_id, partition_groups, sanitize_filename};
use crate::record::AttachmentRecord;

/// One-time setup product shared by every backend instance.
///
/// Holds the loaded configuration and the authenticated remote client.
/// Created once per host class at setup time; cloning is cheap and all
/// clones share the same underlying state.
pub struct StorageContext<C> {
    config: Arc<BackendConfig>,
    client: Arc<C>,
}

impl<C> Clone for StorageContext<C> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            client: Arc::clone(&self.client),
        }
    }
}

impl<C> std::fmt::Debug for StorageContext<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<C: ObjectStorageClient> StorageContext<C> {
    /// Validate `config` and establish the remote client through `factory`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Configuration`] if the configuration is
    /// invalid, or [`BackendError::DependencyUnavailable`] if the client
    /// cannot be established. Either failure aborts setup entirely.
    pub fn initialize<F>(config: BackendConfig, factory: F) -> Result<Self, BackendError>
    where
        F: FnOnce(&BackendConfig) -> Result<C, ClientError>,
    {
        config.validate()?;

        let client = factory(&config)
            .map_err(|e| BackendError::dependency_unavailable(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
            client: Arc::new(client),
        })
    }

    /// The shared configuration.
    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Mint a backend for one record within one operation scope.
    #[must_use]
    pub fn backend(&self) -> StorageBackend<C> {
        StorageBackend {
            config: Arc::clone(&self.config),
            client: Arc::clone(&self.client),
            pending_rename: None,
            upload_token: None,
        }
    }
}

/// Storage backend bound to one record instance.
///
/// Derives storage keys for the record's attachment and performs the three
/// lifecycle operations the host wires in: [`reconcile_rename`] before an
/// update commit, [`store`] after a save carrying a new payload, and
/// [`destroy`] after the record is removed.
///
/// A backend instance assumes single-threaded access, matching
/// request-scoped ORM usage; sharing one instance across threads without
/// external synchronization is a precondition violation.
///
/// [`reconcile_rename`]: StorageBackend::reconcile_rename
/// [`store`]: StorageBackend::store
/// [`destroy`]: StorageBackend::destroy
pub struct StorageBackend<C> {
    config: Arc<BackendConfig>,
    client: Arc<C>,
    pending_rename: Option<String>,
    upload_token: Option<UploadToken>,
}

impl<C: ObjectStorageClient> StorageBackend<C> {
    /// Assign a new filename to the record.
    ///
    /// If the record already has a filename and no rename is pending, the
    /// old name is captured first so the update hook can reconcile it. The
    /// new name is sanitized before being written; path separators can
    /// never reach the stored attribute.
    pub fn set_filename<R: AttachmentRecord>(&mut self, record: &mut R, raw: &str) {
        if self.pending_rename.is_none() {
            if let Some(current) = record.filename() {
                self.pending_rename = Some(current.to_string());
            }
        }
        record.set_filename(sanitize_filename(raw));
    }

    /// The previous filename captured by [`set_filename`], if a rename is
    /// awaiting reconciliation.
    ///
    /// [`set_filename`]: StorageBackend::set_filename
    #[must_use]
    pub fn pending_rename(&self) -> Option<&str> {
        self.pending_rename.as_deref()
    }

    /// The id used in storage paths: the parent's when the record has one
    /// (thumbnails), otherwise the record's own.
    #[must_use]
    pub fn attachment_path_id<R: AttachmentRecord>(&self, record: &R) -> String {
        record
            .parent_id()
            .unwrap_or_else(|| record.id())
            .to_string()
    }

    /// Partition segments for the record's path id, with `trailing`
    /// appended.
    ///
    /// With partitioning disabled this returns `trailing` unchanged.
    /// Otherwise the path id is zero-padded to 8 characters and split into
    /// 4-character groups, bounding directory fan-out to 10,000 entries
    /// per level for sequential ids.
    #[must_use]
    pub fn partition_segments<R: AttachmentRecord>(
        &self,
        record: &R,
        trailing: &[&str],
    ) -> Vec<String> {
        let trailing = trailing.iter().map(ToString::to_string);
        if !self.config.partition {
            return trailing.collect();
        }

        let padded = pad_path_id(&self.attachment_path_id(record));
        partition_groups(&padded).into_iter().chain(trailing).collect()
    }

    /// The key prefix all of the record's objects live under.
    #[must_use]
    pub fn base_path<R: AttachmentRecord>(&self, record: &R) -> String {
        let path_id = self.attachment_path_id(record);
        let segment = if self.config.partition {
            pad_path_id(&path_id)
        } else {
            path_id
        };
        join_key([self.config.path_prefix.as_str(), segment.as_str()])
    }

    /// Full storage key for the record's payload, or for the named
    /// thumbnail variant.
    ///
    /// Deterministic: unchanged inputs always derive the same key.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::InvalidRecord`] if no thumbnail name is
    /// given and the record has no filename.
    pub fn full_key<R: AttachmentRecord>(
        &self,
        record: &R,
        thumbnail: Option<&str>,
    ) -> Result<String, BackendError> {
        let name = match thumbnail {
            Some(thumbnail_name) => thumbnail_name,
            None => record.filename().ok_or_else(|| {
                BackendError::invalid_record("record has no filename to derive a storage key from")
            })?,
        };

        Ok(join_key([self.base_path(record).as_str(), name]))
    }

    /// Public download URL for the record's payload or a thumbnail variant.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`StorageBackend::full_key`].
    pub fn public_url<R: AttachmentRecord>(
        &self,
        record: &R,
        thumbnail: Option<&str>,
    ) -> Result<String, BackendError> {
        let key = self.full_key(record, thumbnail)?;
        let domain = self.config.distribution_domain.trim_end_matches('/');
        Ok(format!("{domain}/{key}"))
    }

    /// Reconcile a pending rename before an update is committed.
    ///
    /// Uploads are stored under a generated immutable key decoupled from
    /// the display filename, so a filename-only rename needs no remote
    /// move; the captured name is dropped and the pending state cleared.
    /// This never fails.
    pub fn reconcile_rename<R: AttachmentRecord>(&mut self, record: &R) {
        if let Some(old) = self.pending_rename.take() {
            if record.filename().is_some_and(|current| current != old) {
                debug!(
                    old = %old,
                    new = record.filename().unwrap_or_default(),
                    "dropping filename-only rename; remote key is immutable"
                );
            }
        }
    }

    /// Upload the record's staged payload to the remote bucket.
    ///
    /// Requests an upload token (memoized for this backend instance),
    /// streams the staged file under [`full_key`], and requires the remote
    /// response to carry a content hash. On success the pending rename is
    /// cleared and the stored filename returned. Nothing is retried here;
    /// on failure the pending rename is left untouched so a caller retry
    /// still has the original rename context.
    ///
    /// # Errors
    ///
    /// [`BackendError::InvalidRecord`] without a filename or staged
    /// payload, [`BackendError::Upload`] when the remote call fails or its
    /// response lacks a success indicator,
    /// [`BackendError::DependencyUnavailable`] when the service is
    /// unreachable.
    ///
    /// [`full_key`]: StorageBackend::full_key
    pub async fn store<R: AttachmentRecord>(
        &mut self,
        record: &R,
    ) -> Result<String, BackendError> {
        let filename = record
            .filename()
            .ok_or_else(|| {
                BackendError::invalid_record("record has no filename to derive a storage key from")
            })?
            .to_string();
        let staged = record
            .staged_file_path()
            .ok_or_else(|| BackendError::invalid_record("record has no staged payload to upload"))?
            .to_path_buf();
        let key = self.full_key(record, None)?;

        let token = self.fetch_upload_token(&key).await?;
        let response = self
            .client
            .upload_file(
                &token,
                &staged,
                record.content_type(),
                &self.config.bucket_name,
                &key,
            )
            .await
            .map_err(|e| match e {
                ClientError::Unavailable(msg) => BackendError::dependency_unavailable(msg),
                other => BackendError::upload(&key, other.to_string()),
            })?;

        if !response.is_success() {
            return Err(BackendError::upload(&key, "response carried no content hash"));
        }

        self.pending_rename = None;
        debug!(%key, "stored attachment payload");
        Ok(filename)
    }

    /// Delete the record's payload from the remote bucket.
    ///
    /// Invoked after the host record is removed from persistent storage.
    /// An absent remote object is reported as a failure; the host decides
    /// whether that is acceptable during cleanup.
    ///
    /// # Errors
    ///
    /// [`BackendError::InvalidRecord`] without a filename,
    /// [`BackendError::Delete`] when the remote deletion fails or the
    /// object is absent, [`BackendError::DependencyUnavailable`] when the
    /// service is unreachable.
    pub async fn destroy<R: AttachmentRecord>(&self, record: &R) -> Result<(), BackendError> {
        let key = self.full_key(record, None)?;

        self.client
            .delete_object(&self.config.bucket_name, &key)
            .await
            .map_err(|e| match e {
                ClientError::Unavailable(msg) => BackendError::dependency_unavailable(msg),
                other => BackendError::delete(&key, other.to_string()),
            })?;

        debug!(%key, "deleted attachment payload");
        Ok(())
    }

    /// Upload token for this backend instance, fetched on first use and
    /// cached for the instance's lifetime (one record within one operation
    /// scope). Tokens are never persisted.
    async fn fetch_upload_token(&mut self, key: &str) -> Result<UploadToken, BackendError> {
        if let Some(token) = &self.upload_token {
            return Ok(token.clone());
        }

        let token = self
            .client
            .generate_upload_token(&self.config.bucket_name)
            .await
            .map_err(|e| match e {
                ClientError::Unavailable(msg) => BackendError::dependency_unavailable(msg),
                other => BackendError::upload(key, format!("token acquisition failed: {other}")),
            })?;

        self.upload_token = Some(token.clone());
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kodo_attach_client::MemoryClient;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    /// Minimal host record for exercising the backend.
    struct TestRecord {
        id: u64,
        parent_id: Option<u64>,
        filename: Option<String>,
        content_type: String,
        staged: Option<PathBuf>,
    }

    impl TestRecord {
        fn new(id: u64) -> Self {
            Self {
                id,
                parent_id: None,
                filename: None,
                content_type: "image/png".to_string(),
                staged: None,
            }
        }
    }

    impl AttachmentRecord for TestRecord {
        fn id(&self) -> crate::record::RecordId {
            crate::record::RecordId::Numeric(self.id)
        }

        fn parent_id(&self) -> Option<crate::record::RecordId> {
            self.parent_id.map(crate::record::RecordId::Numeric)
        }

        fn filename(&self) -> Option<&str> {
            self.filename.as_deref()
        }

        fn set_filename(&mut self, value: String) {
            self.filename = Some(value);
        }

        fn content_type(&self) -> &str {
            &self.content_type
        }

        fn staged_file_path(&self) -> Option<&Path> {
            self.staged.as_deref()
        }
    }

    fn test_config(partition: bool) -> BackendConfig {
        BackendConfig {
            access_key: "test-access".to_string(),
            secret_key: "test-secret".to_string(),
            bucket_name: "media".to_string(),
            path_prefix: "photos".to_string(),
            distribution_domain: "https://cdn.example.com".to_string(),
            partition,
        }
    }

    fn test_context(partition: bool) -> StorageContext<MemoryClient> {
        StorageContext::initialize(test_config(partition), |_| Ok(MemoryClient::new()))
            .expect("context")
    }

    fn staged_file(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write staged payload");
        file
    }

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let mut config = test_config(true);
        config.bucket_name = String::new();

        let err = StorageContext::initialize(config, |_| Ok(MemoryClient::new())).unwrap_err();
        assert!(matches!(err, BackendError::Configuration(_)));
    }

    #[test]
    fn test_initialize_surfaces_factory_failure() {
        let err = StorageContext::<MemoryClient>::initialize(test_config(true), |_| {
            Err(ClientError::unavailable("sdk missing"))
        })
        .unwrap_err();
        assert!(matches!(err, BackendError::DependencyUnavailable(_)));
    }

    #[test]
    fn test_set_filename_captures_first_old_name_only() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(1);

        backend.set_filename(&mut record, "a.png");
        assert_eq!(backend.pending_rename(), None, "nothing to capture yet");

        backend.set_filename(&mut record, "b.png");
        assert_eq!(backend.pending_rename(), Some("a.png"));

        backend.set_filename(&mut record, "c.png");
        assert_eq!(backend.pending_rename(), Some("a.png"));
        assert_eq!(record.filename(), Some("c.png"));
    }

    #[test]
    fn test_set_filename_sanitizes_separators() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(5);

        backend.set_filename(&mut record, "../evil.png");
        assert_eq!(record.filename(), Some("evil.png"));

        let key = backend.full_key(&record, None).expect("key");
        let base = backend.base_path(&record);
        assert!(key.starts_with(&format!("{base}/")));
        assert_eq!(key, "photos/00000005/evil.png");
    }

    #[test]
    fn test_attachment_path_id_prefers_parent() {
        let context = test_context(true);
        let backend = context.backend();

        let mut record = TestRecord::new(9);
        assert_eq!(backend.attachment_path_id(&record), "9");

        record.parent_id = Some(4);
        assert_eq!(backend.attachment_path_id(&record), "4");
    }

    #[test]
    fn test_partition_segments_enabled() {
        let context = test_context(true);
        let backend = context.backend();
        let record = TestRecord::new(1);

        assert_eq!(
            backend.partition_segments(&record, &[]),
            vec!["0000", "0001"]
        );
        assert_eq!(
            backend.partition_segments(&record, &["cat.png"]),
            vec!["0000", "0001", "cat.png"]
        );
    }

    #[test]
    fn test_partition_segments_disabled_passes_trailing_through() {
        let context = test_context(false);
        let backend = context.backend();
        let record = TestRecord::new(1);

        assert_eq!(
            backend.partition_segments(&record, &["cat.png"]),
            vec!["cat.png"]
        );
        assert!(backend.partition_segments(&record, &[]).is_empty());
    }

    #[test]
    fn test_key_derivation_end_to_end() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(5);
        backend.set_filename(&mut record, "cat.png");

        assert_eq!(backend.base_path(&record), "photos/00000005");
        assert_eq!(
            backend.full_key(&record, None).expect("key"),
            "photos/00000005/cat.png"
        );
        assert_eq!(
            backend.full_key(&record, Some("cat_thumb.png")).expect("key"),
            "photos/00000005/cat_thumb.png"
        );
        assert_eq!(
            backend.public_url(&record, None).expect("url"),
            "https://cdn.example.com/photos/00000005/cat.png"
        );
    }

    #[test]
    fn test_key_derivation_unpartitioned() {
        let context = test_context(false);
        let mut backend = context.backend();
        let mut record = TestRecord::new(5);
        backend.set_filename(&mut record, "cat.png");

        assert_eq!(backend.base_path(&record), "photos/5");
        assert_eq!(
            backend.full_key(&record, None).expect("key"),
            "photos/5/cat.png"
        );
    }

    #[test]
    fn test_full_key_is_deterministic() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(77);
        backend.set_filename(&mut record, "doc.pdf");

        let first = backend.full_key(&record, None).expect("key");
        for _ in 0..10 {
            assert_eq!(backend.full_key(&record, None).expect("key"), first);
        }
    }

    #[test]
    fn test_full_key_without_filename_is_invalid_record() {
        let context = test_context(true);
        let backend = context.backend();
        let record = TestRecord::new(1);

        let err = backend.full_key(&record, None).unwrap_err();
        assert!(matches!(err, BackendError::InvalidRecord(_)));

        // A thumbnail name stands in for the missing filename.
        assert!(backend.full_key(&record, Some("thumb.png")).is_ok());
    }

    #[test]
    fn test_reconcile_rename_always_clears_pending() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(1);

        // No pending state: a no-op.
        backend.reconcile_rename(&record);
        assert_eq!(backend.pending_rename(), None);

        // Pending rename to a different name: cleared, no remote call.
        backend.set_filename(&mut record, "a.png");
        backend.set_filename(&mut record, "b.png");
        assert_eq!(backend.pending_rename(), Some("a.png"));
        backend.reconcile_rename(&record);
        assert_eq!(backend.pending_rename(), None);

        // Pending rename back to the same name: also cleared.
        backend.set_filename(&mut record, "b.png");
        assert_eq!(backend.pending_rename(), Some("b.png"));
        backend.reconcile_rename(&record);
        assert_eq!(backend.pending_rename(), None);
    }

    #[tokio::test]
    async fn test_store_uploads_and_clears_pending_rename() {
        let context = test_context(true);
        let mut backend = context.backend();
        let staged = staged_file(b"cat bytes");

        let mut record = TestRecord::new(5);
        record.staged = Some(staged.path().to_path_buf());
        backend.set_filename(&mut record, "cat.png");
        backend.set_filename(&mut record, "cat-renamed.png");
        assert_eq!(backend.pending_rename(), Some("cat.png"));

        let stored = backend.store(&record).await.expect("store");
        assert_eq!(stored, "cat-renamed.png");
        assert_eq!(backend.pending_rename(), None);
        assert!(
            context_client(&context)
                .contains("media", "photos/00000005/cat-renamed.png")
                .await
        );
    }

    #[tokio::test]
    async fn test_store_without_hash_fails_and_keeps_pending_rename() {
        let context = test_context(true);
        let mut backend = context.backend();
        context_client(&context).set_fail_uploads(true);
        let staged = staged_file(b"payload");

        let mut record = TestRecord::new(5);
        record.staged = Some(staged.path().to_path_buf());
        backend.set_filename(&mut record, "a.png");
        backend.set_filename(&mut record, "b.png");

        let err = backend.store(&record).await.unwrap_err();
        assert!(matches!(err, BackendError::Upload { .. }));
        assert_eq!(
            backend.pending_rename(),
            Some("a.png"),
            "failed store must keep the rename context for a caller retry"
        );
    }

    #[tokio::test]
    async fn test_store_when_offline_is_dependency_unavailable() {
        let context = test_context(true);
        let mut backend = context.backend();
        context_client(&context).set_offline(true);
        let staged = staged_file(b"payload");

        let mut record = TestRecord::new(5);
        record.staged = Some(staged.path().to_path_buf());
        backend.set_filename(&mut record, "cat.png");

        let err = backend.store(&record).await.unwrap_err();
        assert!(matches!(err, BackendError::DependencyUnavailable(_)));
    }

    #[tokio::test]
    async fn test_store_without_staged_payload_is_invalid_record() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(5);
        backend.set_filename(&mut record, "cat.png");

        let err = backend.store(&record).await.unwrap_err();
        assert!(matches!(err, BackendError::InvalidRecord(_)));
    }

    #[tokio::test]
    async fn test_store_memoizes_upload_token_per_instance() {
        let context = test_context(true);
        let mut backend = context.backend();
        let staged = staged_file(b"payload");

        let mut record = TestRecord::new(5);
        record.staged = Some(staged.path().to_path_buf());
        backend.set_filename(&mut record, "cat.png");

        backend.store(&record).await.expect("first store");
        backend.store(&record).await.expect("second store");
        assert_eq!(context_client(&context).issued_tokens(), 1);

        // A fresh backend instance starts a new operation scope.
        let mut fresh = context.backend();
        fresh.store(&record).await.expect("store via fresh backend");
        assert_eq!(context_client(&context).issued_tokens(), 2);
    }

    #[tokio::test]
    async fn test_destroy_removes_stored_object() {
        let context = test_context(true);
        let mut backend = context.backend();
        let staged = staged_file(b"payload");

        let mut record = TestRecord::new(5);
        record.staged = Some(staged.path().to_path_buf());
        backend.set_filename(&mut record, "cat.png");
        backend.store(&record).await.expect("store");

        backend.destroy(&record).await.expect("destroy");
        assert!(
            !context_client(&context)
                .contains("media", "photos/00000005/cat.png")
                .await
        );
    }

    #[tokio::test]
    async fn test_destroy_missing_object_is_delete_error() {
        let context = test_context(true);
        let mut backend = context.backend();
        let mut record = TestRecord::new(5);
        backend.set_filename(&mut record, "cat.png");

        let err = backend.destroy(&record).await.unwrap_err();
        assert!(matches!(err, BackendError::Delete { .. }));
    }

    /// Shared client handle for assertions.
    fn context_client(context: &StorageContext<MemoryClient>) -> &MemoryClient {
        context.client.as_ref()
    }
}
