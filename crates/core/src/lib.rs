//! Storage backend core for kodo-attach.
//!
//! Lets a database-backed attachment record persist its binary payload to
//! Qiniu cloud storage: deterministic storage-key derivation, rename-safe
//! filename handling across the save lifecycle, and upload / delete
//! operations delegated to an injected [`ObjectStorageClient`].
//!
//! The host record system stays external: it implements
//! [`AttachmentRecord`] and invokes the backend at three lifecycle points —
//! [`StorageBackend::reconcile_rename`] before an update commit,
//! [`StorageBackend::store`] after a save carrying a new payload, and
//! [`StorageBackend::destroy`] after destruction.
//!
//! # Modules
//!
//! - `backend` - per-record lifecycle operations and key derivation
//! - `config` - environment-sectioned YAML configuration
//! - `error` - backend error taxonomy
//! - `key` - pure key helpers (sanitization, partitioning)
//! - `record` - host record boundary
//!
//! [`ObjectStorageClient`]: kodo_attach_client::ObjectStorageClient

pub mod backend;
pub mod config;
pub mod error;
pub mod key;
pub mod record;

pub use backend::{StorageBackend, StorageContext};
pub use config::BackendConfig;
pub use error::BackendError;
pub use key::sanitize_filename;
pub use record::{AttachmentRecord, RecordId};
