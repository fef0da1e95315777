//! API server: owns the shared store and admits authenticated entities.
//!
//! Each login produces a fresh [`Root`] with its own resource registry. The
//! transport calls [`Root::kill`] when the connection goes away.

use crate::auth::Entity;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::root::Root;
use crate::state::State;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Server {
    state: Arc<State>,
    config: ServerConfig,
}

impl Server {
    /// Create a server with a fresh store sized from the watcher settings.
    pub fn new(config: ServerConfig) -> Result<Self, ApiError> {
        config.validate()?;
        let state = Arc::new(State::new(config.watcher.change_buffer));
        Ok(Self::with_state(state, config))
    }

    /// Serve an existing store.
    pub fn with_state(state: Arc<State>, config: ServerConfig) -> Self {
        info!(
            change_buffer = config.watcher.change_buffer,
            allow_agents = config.login.allow_agents,
            allow_clients = config.login.allow_clients,
            "API server ready"
        );
        Self { state, config }
    }

    /// Admit an authenticated entity and build its connection root.
    pub fn login(&self, entity: Entity) -> Result<Root, ApiError> {
        if self.state.is_closed() {
            return Err(ApiError::StoreClosed);
        }
        let allowed = if entity.is_agent() {
            self.config.login.allow_agents
        } else {
            self.config.login.allow_clients
        };
        if !allowed {
            warn!(tag = %entity.tag(), "Login refused by configuration");
            return Err(ApiError::PermissionDenied);
        }
        info!(tag = %entity.tag(), "Login");
        Ok(Root::new(self.state.clone(), entity))
    }

    pub fn state(&self) -> &Arc<State> {
        &self.state
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Close the store. Every suspended watcher fetch on every connection
    /// resolves with `StoreClosed`.
    pub fn close(&self) {
        self.state.close();
    }
}
