// src/config.rs - Configuration lives in the shared crate
pub use yzscan_shared::config::*;

use std::path::Path;

/// Loads `path` if it exists; a missing file at the default location falls
/// back to built-in defaults.
pub fn load_or_default(path: &Path, explicit: bool) -> Result<Config, ConfigError> {
    if !explicit && !path.exists() {
        tracing::info!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    tracing::info!("Loading configuration from: {}", path.display());
    load_config(path)
}
