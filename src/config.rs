//! Server configuration.
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file, then `APIROOT_*` environment variables (nested keys separated by
//! `__`, e.g. `APIROOT_WATCHER__CHANGE_BUFFER=512`).

pub mod loader;
pub mod sources;

pub use loader::ConfigLoader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use crate::state::DEFAULT_CHANGE_BUFFER;
use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub watcher: WatcherConfig,

    #[serde(default)]
    pub login: LoginConfig,
}

/// Watcher tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Capacity of the store's change feed. A watcher that falls further
    /// behind than this resynchronises from a snapshot.
    #[serde(default = "default_change_buffer")]
    pub change_buffer: usize,
}

fn default_change_buffer() -> usize {
    DEFAULT_CHANGE_BUFFER
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            change_buffer: default_change_buffer(),
        }
    }
}

/// Which principal classes may log in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_true")]
    pub allow_agents: bool,

    #[serde(default = "default_true")]
    pub allow_clients: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            allow_agents: true,
            allow_clients: true,
        }
    }
}

impl ServerConfig {
    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.watcher.change_buffer == 0 {
            return Err(ApiError::ConfigError(
                "watcher.change_buffer must be at least 1".to_string(),
            ));
        }
        if !self.login.allow_agents && !self.login.allow_clients {
            return Err(ApiError::ConfigError(
                "login must allow agents, clients, or both".to_string(),
            ));
        }
        Ok(())
    }
}
