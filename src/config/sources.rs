//! Configuration sources, lowest precedence first.

use super::ServerConfig;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use std::path::Path;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "APIROOT";

/// Builder seeded with [`ServerConfig::default`].
pub fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let defaults = Config::try_from(&ServerConfig::default())?;
    Ok(Config::builder().add_source(defaults))
}

/// Add a TOML file. A missing file is an error only when `required`.
pub fn add_file(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
    required: bool,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let name = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("config path {:?} is not UTF-8", path)))?;
    Ok(builder.add_source(
        File::new(name, FileFormat::Toml).required(required),
    ))
}

/// Add the `APIROOT_*` environment overlay; `__` separates nested keys.
pub fn add_environment(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Ok(builder.add_source(environment()))
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Default config file location under the platform config directory.
pub fn default_config_path() -> Option<std::path::PathBuf> {
    directories::ProjectDirs::from("", "apiroot", "apiroot")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
