//! Subcommand implementations.

pub mod batch;
pub mod config;
pub mod output;
pub mod process;

use std::path::Path;

use chirashi_core::ChirashiConfig;

/// Load the config named by `--config`, or the defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ChirashiConfig> {
    match config_path {
        Some(path) => ChirashiConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path, e)),
        None => Ok(ChirashiConfig::default()),
    }
}
