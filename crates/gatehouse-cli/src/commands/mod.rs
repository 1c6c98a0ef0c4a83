pub mod inspect;
pub mod proxy;
pub mod serve;

use std::path::Path;

use anyhow::Context;
use gatehouse_core::{GateConfig, default_config_path, load_config_from_file, validate_config};

/// Load the config from `explicit`, or from the default location. Without
/// `--config` a missing default file means built-in defaults.
pub fn load_config(explicit: Option<&Path>) -> anyhow::Result<GateConfig> {
    if let Some(path) = explicit {
        return load_config_from_file(path)
            .with_context(|| format!("loading config {}", path.display()));
    }

    let path = default_config_path();
    if path.exists() {
        return load_config_from_file(&path)
            .with_context(|| format!("loading config {}", path.display()));
    }

    tracing::debug!(path = %path.display(), "no config file, using defaults");
    let config = GateConfig::default();
    validate_config(&config)?;
    Ok(config)
}
