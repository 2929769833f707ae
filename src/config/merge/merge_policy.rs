//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("storage.store_path", ".sitenav/store")?
        .set_default("navigation.settle_ms", 1500_i64)?
        .set_default("navigation.load_timeout_ms", 10_000_i64)?
        .set_default("navigation.restore_timeout_ms", 30_000_i64)?
        .set_default("sync.on_startup", true)
}
