//! Backend configuration loading.

use std::path::Path;

use serde::Deserialize;

use crate::error::BackendError;

/// Storage backend configuration.
///
/// Loaded once at setup from a YAML file holding one section per
/// deployment environment, then shared read-only by every backend
/// instance. Construction fails fast: a missing or invalid file aborts
/// setup entirely, there is no degraded mode.
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Access credential for the storage service.
    pub access_key: String,
    /// Secret credential for the storage service.
    pub secret_key: String,
    /// Bucket all objects are stored in.
    pub bucket_name: String,
    /// Leading key segment for every stored object.
    pub path_prefix: String,
    /// Public domain download URLs are served from.
    pub distribution_domain: String,
    /// Whether ids are partitioned into fixed-width path segments to bound
    /// directory fan-out.
    #[serde(default = "default_partition")]
    pub partition: bool,
}

fn default_partition() -> bool {
    true
}

impl BackendConfig {
    /// Config file path used when none is given.
    pub const DEFAULT_CONFIG_PATH: &'static str = "config/qiniu.yml";

    /// Environment section used when `RUN_MODE` is unset.
    pub const DEFAULT_ENVIRONMENT: &'static str = "development";

    /// Load the section for `environment` from the YAML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Configuration`] if the file is missing or
    /// unparsable, the environment section is absent or incomplete, or a
    /// required field is empty.
    pub fn load(path: impl AsRef<Path>, environment: &str) -> Result<Self, BackendError> {
        let path = path.as_ref();

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()
            .map_err(|e| {
                BackendError::configuration(format!("cannot load {}: {e}", path.display()))
            })?;

        let loaded: Self = settings.get(environment).map_err(|e| {
            BackendError::configuration(format!(
                "missing or invalid '{environment}' section in {}: {e}",
                path.display()
            ))
        })?;

        loaded.validate()?;
        Ok(loaded)
    }

    /// Load from the default path, selecting the environment from the
    /// `RUN_MODE` environment variable.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BackendConfig::load`].
    pub fn load_default() -> Result<Self, BackendError> {
        let environment = std::env::var("RUN_MODE")
            .unwrap_or_else(|_| Self::DEFAULT_ENVIRONMENT.to_string());
        Self::load(Self::DEFAULT_CONFIG_PATH, &environment)
    }

    /// Check that required fields are present and non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Configuration`] naming the first empty
    /// required field.
    pub fn validate(&self) -> Result<(), BackendError> {
        let required = [
            ("access_key", &self.access_key),
            ("secret_key", &self.secret_key),
            ("bucket_name", &self.bucket_name),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(BackendError::configuration(format!(
                    "required field '{field}' is missing or empty"
                )));
            }
        }

        Ok(())
    }
}
