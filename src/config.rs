//! Configuration System
//!
//! Layered configuration: built-in defaults, the global config file, workspace config
//! files, then `SITENAV_*` environment variables (nested keys separated by `__`, e.g.
//! `SITENAV_NAVIGATION__SETTLE_MS=500`).

use crate::error::CmsError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod merge;
mod sources;

pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub navigation: NavigationConfig,

    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the site store lives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Store directory; relative paths resolve against the workspace root
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".sitenav/store")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
        }
    }
}

/// Degraded-mode timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationConfig {
    /// Delay between a failed or empty navigation load and switching to the fallback
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Upper bound for one navigation read
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,

    /// Upper bound for one force-bootstrap run
    #[serde(default = "default_restore_timeout_ms")]
    pub restore_timeout_ms: u64,
}

fn default_settle_ms() -> u64 {
    1500
}

fn default_load_timeout_ms() -> u64 {
    10_000
}

fn default_restore_timeout_ms() -> u64 {
    30_000
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
            load_timeout_ms: default_load_timeout_ms(),
            restore_timeout_ms: default_restore_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Run an incremental sync when the site API starts
    #[serde(default = "default_true")]
    pub on_startup: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_startup: default_true(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Storage(String),
    Navigation(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Storage(msg) => write!(f, "Storage: {}", msg),
            ValidationError::Navigation(msg) => write!(f, "Navigation: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl SiteConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.storage.store_path.as_os_str().is_empty() {
            errors.push(ValidationError::Storage(
                "store path cannot be empty".to_string(),
            ));
        }

        let nav = &self.navigation;
        for (name, value) in [
            ("settle_ms", nav.settle_ms),
            ("load_timeout_ms", nav.load_timeout_ms),
            ("restore_timeout_ms", nav.restore_timeout_ms),
        ] {
            if value == 0 {
                errors.push(ValidationError::Navigation(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }

        if let Err(e) = self.logging.validate() {
            errors.push(ValidationError::Logging(e));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Validate, folding every problem into one configuration error.
    pub fn validated(self) -> Result<Self, CmsError> {
        self.validate().map_err(|errors| {
            let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            CmsError::Config(format!(
                "Configuration validation failed:\n{}",
                msgs.join("\n")
            ))
        })?;
        Ok(self)
    }

    /// Store directory resolved against the workspace root.
    pub fn resolve_store_path(&self, workspace_root: &Path) -> PathBuf {
        if self.storage.store_path.is_absolute() {
            self.storage.store_path.clone()
        } else {
            workspace_root.join(&self.storage.store_path)
        }
    }
}

/// Loads [`SiteConfig`] from its sources
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for a workspace.
    ///
    /// Precedence (lowest to highest): defaults, global file, `config/config.toml`,
    /// `config/{SITENAV_ENV}.toml`, environment.
    pub fn load(workspace_root: &Path) -> Result<SiteConfig, config::ConfigError> {
        let builder = merge::merge_policy::builder_with_defaults()?;
        let builder = sources::global_file::add_to_builder(builder)?;
        let builder = sources::workspace_file::add_to_builder(builder, workspace_root)?;
        builder
            .add_source(environment())
            .build()?
            .try_deserialize()
    }

    /// Load from one explicit file (plus defaults and environment).
    pub fn load_from_file(path: &Path) -> Result<SiteConfig, config::ConfigError> {
        merge::merge_policy::builder_with_defaults()?
            .add_source(config::File::from(path).required(true))
            .add_source(environment())
            .build()?
            .try_deserialize()
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("SITENAV")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}
