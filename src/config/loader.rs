//! ConfigLoader: composes the sources and deserializes a [`ServerConfig`].

use super::sources;
use super::ServerConfig;
use crate::error::ApiError;
use std::path::Path;
use tracing::debug;

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration.
    ///
    /// Precedence: defaults (lowest) -> config file -> environment (highest).
    /// With no explicit path the platform config file is used if it exists.
    pub fn load(path: Option<&Path>) -> Result<ServerConfig, ApiError> {
        let builder = sources::builder_with_defaults()?;
        let builder = match path {
            Some(path) => sources::add_file(builder, path, true)?,
            None => match sources::default_config_path() {
                Some(default) => sources::add_file(builder, &default, false)?,
                None => builder,
            },
        };
        let builder = sources::add_environment(builder)?;
        let config: ServerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        debug!(?path, "Configuration loaded");
        Ok(config)
    }

    /// Load configuration from a specific file with the environment overlay.
    pub fn load_from_file(path: &Path) -> Result<ServerConfig, ApiError> {
        Self::load(Some(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[watcher]\nchange_buffer = 32\n\n[logging]\nlevel = \"debug\"").unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.watcher.change_buffer, 32);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ConfigLoader::load(Some(&missing)),
            Err(ApiError::ConfigError(_))
        ));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[watcher]\nchange_buffer = 0").unwrap();
        assert!(matches!(
            ConfigLoader::load_from_file(file.path()),
            Err(ApiError::ConfigError(_))
        ));
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[login]\nallow_clients = true").unwrap();

        std::env::set_var("APIROOT_LOGIN__ALLOW_CLIENTS", "false");
        let result = ConfigLoader::load_from_file(file.path());
        std::env::remove_var("APIROOT_LOGIN__ALLOW_CLIENTS");

        let config = result.unwrap();
        assert!(!config.login.allow_clients);
    }
}
