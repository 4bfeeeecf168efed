//! Configuration management for the TSP gateway

mod gateway;

pub use gateway::{AdvertiseConfig, BackendConfig, GatewayConfig};

use crate::error::ConfigError;
use std::path::{Path, PathBuf};

/// Get the default configuration directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tsp-gateway")
}

/// Get the default configuration file path
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.toml")
}

/// Load configuration from a file
pub fn load_config<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Invalid(format!("Failed to read config: {}", e)))?;

    let config: T = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config<T: serde::Serialize>(path: &Path, config: &T) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| ConfigError::Invalid(format!("Failed to create config dir: {}", e)))?;
    }

    std::fs::write(path, content)
        .map_err(|e| ConfigError::Invalid(format!("Failed to write config: {}", e)))?;

    Ok(())
}

/// Write `config` to `path` as a starting point for editing.
///
/// Refuses to replace an existing file unless `force` is set.
pub fn init_config<T: serde::Serialize>(
    path: &Path,
    config: &T,
    force: bool,
) -> Result<(), ConfigError> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }
    save_config(path, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = GatewayConfig::default();
        config.backend.host = "router.internal".to_string();
        config.strict_sequencing = true;

        save_config(&path, &config).unwrap();
        let loaded: GatewayConfig = load_config(&path).unwrap();

        assert_eq!(loaded.backend.host, "router.internal");
        assert!(loaded.strict_sequencing);
        assert_eq!(loaded.bind_address, config.bind_address);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");

        let result = load_config::<GatewayConfig>(&path);
        assert!(matches!(result, Err(ConfigError::NotFound(p)) if p == path));
    }

    #[test]
    fn test_load_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "bind_address = [").unwrap();

        assert!(matches!(
            load_config::<GatewayConfig>(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        init_config(&path, &GatewayConfig::default(), false).unwrap();
        let written: GatewayConfig = load_config(&path).unwrap();
        assert_eq!(written.backend.port, 877);

        let mut changed = GatewayConfig::default();
        changed.backend.port = 9000;
        assert!(matches!(
            init_config(&path, &changed, false),
            Err(ConfigError::AlreadyExists(p)) if p == path
        ));
        let untouched: GatewayConfig = load_config(&path).unwrap();
        assert_eq!(untouched.backend.port, 877);

        init_config(&path, &changed, true).unwrap();
        let replaced: GatewayConfig = load_config(&path).unwrap();
        assert_eq!(replaced.backend.port, 9000);
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("tsp-gateway/config.toml"));
    }
}
