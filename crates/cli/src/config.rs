//! CLI configuration utilities

use anyhow::{Context, Result};
use hostel_http::ClientConfig;
use std::path::{Path, PathBuf};
use tracing::info;

/// Name of the configuration file inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Resolve which configuration to use
///
/// An explicit path wins; otherwise `<data_dir>/config.json` if it exists;
/// otherwise defaults plus `HOSTEL_*` environment variables.
pub fn load_client_config(explicit: Option<PathBuf>, data_dir: &Path) -> Result<ClientConfig> {
    let path = explicit.or_else(|| {
        let default_config = data_dir.join(CONFIG_FILE);
        default_config.exists().then_some(default_config)
    });

    if let Some(path) = &path {
        info!("Loading configuration from: {}", path.display());
    } else {
        info!("Using default configuration with environment overrides");
    }

    ClientConfig::load(path.as_deref()).context("failed to load client configuration")
}

/// Save client configuration to JSON file
pub fn save_client_config<P: AsRef<Path>>(config: &ClientConfig, path: P) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Generate a default configuration file
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
    let config = ClientConfig::default();
    save_client_config(&config, path)
}
