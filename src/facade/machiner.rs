//! Machiner facade: lets a machine agent follow and finish its own machine.

use super::params::{ErrorResult, LifeResult, NotifyWatchResult, SetStatus};
use super::{owned_machine, register_notify, FacadeFactory};
use crate::auth::Authorizer;
use crate::error::ApiError;
use crate::resource::Resources;
use crate::state::{EntityWatcher, State};
use crate::types::Life;
use std::sync::Arc;
use tracing::debug;

pub struct MachinerApi {
    state: Arc<State>,
    resources: Arc<Resources>,
    authorizer: Arc<dyn Authorizer>,
}

impl FacadeFactory for MachinerApi {
    const NAME: &'static str = "Machiner";

    fn construct(
        state: &Arc<State>,
        resources: &Arc<Resources>,
        authorizer: &Arc<dyn Authorizer>,
    ) -> Result<Self, ApiError> {
        if !authorizer.auth_machine_agent() {
            return Err(ApiError::PermissionDenied);
        }
        Ok(Self {
            state: state.clone(),
            resources: resources.clone(),
            authorizer: authorizer.clone(),
        })
    }
}

impl MachinerApi {
    fn machine_id(&self, tag: &str) -> Result<String, ApiError> {
        owned_machine(self.authorizer.as_ref(), tag)
    }

    pub fn life(&self, tags: &[String]) -> Vec<LifeResult> {
        tags.iter()
            .map(|tag| {
                let id = self.machine_id(tag)?;
                Ok(self.state.machine(&id)?.life)
            })
            .map(LifeResult::from)
            .collect()
    }

    pub fn set_status(&self, args: &[SetStatus]) -> Vec<ErrorResult> {
        args.iter()
            .map(|arg| {
                let id = self.machine_id(&arg.tag)?;
                self.state.set_machine_status(&id, arg.status, &arg.info)
            })
            .map(ErrorResult::from)
            .collect()
    }

    /// Advance each machine to dead. Already-dead machines are left alone.
    pub fn ensure_dead(&self, tags: &[String]) -> Vec<ErrorResult> {
        tags.iter()
            .map(|tag| {
                let id = self.machine_id(tag)?;
                self.state.advance_machine_life(&id, Life::Dead)
            })
            .map(ErrorResult::from)
            .collect()
    }

    /// Start a watcher per machine and return the registered ids.
    pub async fn watch(&self, tags: &[String]) -> Vec<NotifyWatchResult> {
        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let res = match self.machine_id(tag) {
                Ok(id) => match self.state.machine(&id) {
                    Ok(_) => {
                        let watcher = Arc::new(EntityWatcher::for_machine(&self.state, &id));
                        register_notify(&self.resources, watcher).await
                    }
                    Err(e) => Err(e),
                },
                Err(e) => Err(e),
            };
            if let Ok(watcher_id) = &res {
                debug!(tag = %tag, watcher_id = %watcher_id, "Machine watcher registered");
            }
            results.push(NotifyWatchResult::from(res));
        }
        results
    }
}
