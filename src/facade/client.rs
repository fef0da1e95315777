//! Client facade: the administrative view of the environment.

use super::params::{AllWatcherId, ClientStatus};
use crate::error::ApiError;
use crate::resource::{Registered, Resources};
use crate::state::{MultiWatcher, State};
use crate::types::{Life, MachineJob};
use std::sync::Arc;
use tracing::{debug, info};

pub struct ClientApi {
    state: Arc<State>,
    resources: Arc<Resources>,
}

impl ClientApi {
    /// The root holds one client facade for its whole life; the role gate is
    /// applied on access, not here.
    pub fn new(state: Arc<State>, resources: Arc<Resources>) -> Self {
        Self { state, resources }
    }

    /// Machines and units with their life and status.
    pub fn status(&self) -> Result<ClientStatus, ApiError> {
        if self.state.is_closed() {
            return Err(ApiError::StoreClosed);
        }
        Ok(ClientStatus {
            agent_version: self.state.environ_agent_version(),
            machines: self.state.machines().iter().map(|m| m.info()).collect(),
            units: self.state.units().iter().map(|u| u.info()).collect(),
        })
    }

    /// Register a watcher over every entity in the environment.
    pub fn watch_all(&self) -> Result<AllWatcherId, ApiError> {
        let watcher = Arc::new(MultiWatcher::new(self.state.clone()));
        let id = self.resources.register(Registered::All(watcher))?;
        debug!(watcher_id = %id, "Multiwatcher registered");
        Ok(AllWatcherId { all_watcher_id: id })
    }

    /// Add a machine and return its id.
    pub fn add_machine(&self, jobs: Vec<MachineJob>) -> Result<String, ApiError> {
        let machine = self.state.add_machine(jobs)?;
        info!(machine_id = %machine.id, "Machine added");
        Ok(machine.id)
    }

    /// Add a unit of `service`, optionally placed on a machine, and return
    /// its name.
    pub fn add_unit(&self, service: &str, machine_id: Option<&str>) -> Result<String, ApiError> {
        let unit = self.state.add_unit(service, machine_id)?;
        info!(unit = %unit.name, machine_id = ?unit.machine_id, "Unit added");
        Ok(unit.name)
    }

    /// Ask a machine to shut down.
    pub fn destroy_machine(&self, id: &str) -> Result<(), ApiError> {
        self.state.advance_machine_life(id, Life::Dying)
    }

    /// Set the tools version every agent should converge on.
    pub fn set_environ_agent_version(&self, version: &str) -> Result<(), ApiError> {
        self.state.set_environ_agent_version(version)?;
        info!(version = %version, "Environment agent version set");
        Ok(())
    }
}
