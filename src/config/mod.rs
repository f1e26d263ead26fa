mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    let default_paths = ["./stockroom.toml", "~/.config/stockroom/config.toml"];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.storage.pool_size == 0 {
        anyhow::bail!("storage.pool_size must be greater than 0");
    }

    if config.storage.blob_key.trim().is_empty() {
        anyhow::bail!("storage.blob_key cannot be empty");
    }

    if !(1..=100).contains(&config.images.jpeg_quality) {
        anyhow::bail!(
            "images.jpeg_quality must be between 1 and 100, got {}",
            config.images.jpeg_quality
        );
    }

    if config.images.max_dimension == 0 {
        anyhow::bail!("images.max_dimension must be greater than 0");
    }

    if config.images.path_prefix.is_empty() {
        anyhow::bail!("images.path_prefix cannot be empty");
    }

    if !config.storage.data_dir.exists() {
        tracing::warn!(
            "Data directory does not exist and will be created: {:?}",
            config.storage.data_dir
        );
    }

    Ok(())
}
