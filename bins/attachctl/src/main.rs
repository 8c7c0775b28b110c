//! Local sandbox for exercising the storage backend end to end.
//!
//! Runs a full attachment lifecycle (assign filename, upload, resolve the
//! public URL, delete) against the in-memory client, so key derivation and
//! configuration can be inspected without touching the real service.
//!
//! Usage: `attachctl <file> [filename]`
//!
//! Environment: `QINIU_CONFIG` overrides the config file path,
//! `RUN_MODE` selects the environment section (default: development).

use std::path::{Path, PathBuf};

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kodo_attach_client::MemoryClient;
use kodo_attach_core::{AttachmentRecord, BackendConfig, RecordId, StorageContext};

/// Synthetic attachment record for sandbox runs.
struct SandboxRecord {
    id: u64,
    filename: Option<String>,
    content_type: String,
    staged: Option<PathBuf>,
}

impl AttachmentRecord for SandboxRecord {
    fn id(&self) -> RecordId {
        RecordId::Numeric(self.id)
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "attachctl=info,kodo_attach_core=debug,kodo_attach_client=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let file = args
        .next()
        .map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("usage: attachctl <file> [filename]"))?;
    let display_name = args.next().unwrap_or_else(|| {
        file.file_name()
            .map_or_else(|| "upload.bin".to_string(), |n| n.to_string_lossy().into_owned())
    });

    // Load configuration; any failure here is fatal before anything runs.
    let config_path = std::env::var("QINIU_CONFIG")
        .unwrap_or_else(|_| BackendConfig::DEFAULT_CONFIG_PATH.to_string());
    let environment = std::env::var("RUN_MODE")
        .unwrap_or_else(|_| BackendConfig::DEFAULT_ENVIRONMENT.to_string());
    let config = BackendConfig::load(&config_path, &environment)?;
    info!(
        bucket = %config.bucket_name,
        prefix = %config.path_prefix,
        partition = config.partition,
        "configuration loaded from {config_path} [{environment}]"
    );

    let context = StorageContext::initialize(config, |_| Ok(MemoryClient::new()))?;
    let mut backend = context.backend();

    let mut record = SandboxRecord {
        id: 1,
        filename: None,
        content_type: "application/octet-stream".to_string(),
        staged: Some(file.clone()),
    };

    backend.set_filename(&mut record, &display_name);
    info!(filename = ?record.filename(), "filename assigned");

    let key = backend.full_key(&record, None)?;
    let stored = backend.store(&record).await?;
    info!(filename = %stored, %key, "payload stored");

    let url = backend.public_url(&record, None)?;
    info!(%url, "public URL");

    backend.destroy(&record).await?;
    info!("payload deleted");

    Ok(())
}
