use super::params::AgentMachineResult;
use super::{owned_machine, FacadeFactory};
use crate::auth::Authorizer;
use crate::error::ApiError;
use crate::resource::Resources;
use crate::state::State;
use std::sync::Arc;

/// Machine agent bootstrap facade: what an agent needs to know about itself
/// before starting its workers.
pub struct MachineAgentApi {
    state: Arc<State>,
    authorizer: Arc<dyn Authorizer>,
}

impl FacadeFactory for MachineAgentApi {
    const NAME: &'static str = "MachineAgent";

    fn construct(
        state: &Arc<State>,
        _resources: &Arc<Resources>,
        authorizer: &Arc<dyn Authorizer>,
    ) -> Result<Self, ApiError> {
        if !authorizer.auth_machine_agent() {
            return Err(ApiError::PermissionDenied);
        }
        Ok(Self {
            state: state.clone(),
            authorizer: authorizer.clone(),
        })
    }
}

impl MachineAgentApi {
    /// Life and jobs for each owned machine.
    pub fn get_machines(&self, tags: &[String]) -> Vec<AgentMachineResult> {
        tags.iter()
            .map(|tag| {
                let id = owned_machine(self.authorizer.as_ref(), tag)?;
                let machine = self.state.machine(&id)?;
                Ok((machine.life, machine.jobs))
            })
            .map(AgentMachineResult::from)
            .collect()
    }
}
