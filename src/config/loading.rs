//! Bootstrap file discovery and loading.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use super::BootstrapConfig;
use super::builder::create_default_config;
use super::validation::validate_bootstrap;

const CONFIG_FILE_NAME: &str = "mrty-tv.toml";

/// Custom configuration directory from `--config`, set once at startup.
static CONFIG_DIR: OnceLock<Option<PathBuf>> = OnceLock::new();

/// Set the configuration directory for the current process.
///
/// Returns an error if it was already set.
pub fn set_config_dir(dir: Option<String>) -> Result<()> {
    CONFIG_DIR
        .set(dir.map(PathBuf::from))
        .map_err(|_| anyhow::anyhow!("Configuration directory already set"))
}

fn custom_config_dir() -> Option<PathBuf> {
    CONFIG_DIR.get().and_then(|d| d.clone())
}

/// Path of the bootstrap file, honoring `--config`.
pub fn get_config_path() -> Result<PathBuf> {
    if let Some(dir) = custom_config_dir() {
        return Ok(dir.join(CONFIG_FILE_NAME));
    }

    let base = dirs::config_dir().context("Could not determine the user configuration directory")?;
    Ok(base.join("mrty-tv").join(CONFIG_FILE_NAME))
}

/// Load the bootstrap file, writing a default one first if none exists.
pub fn load() -> Result<BootstrapConfig> {
    let path = get_config_path()?;

    if !path.exists() {
        create_default_config(&path).context("Failed to create default config during load")?;
    }

    load_from_path(&path)
}

/// Load and validate a bootstrap file without creating it.
pub fn load_from_path(path: &Path) -> Result<BootstrapConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;

    let config: BootstrapConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", path.display()))?;

    validate_bootstrap(&config)
        .with_context(|| format!("Invalid configuration in {}", path.display()))?;

    Ok(config)
}
