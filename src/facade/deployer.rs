//! Deployer facade: lets a machine agent follow and clean up the units
//! assigned to its machine.

use super::params::{ErrorResult, LifeResult, StringsWatchResult};
use super::{owned_machine, register_strings, FacadeFactory};
use crate::auth::{Authorizer, Tag};
use crate::error::ApiError;
use crate::resource::Resources;
use crate::state::{State, UnitsWatcher};
use crate::types::Life;
use std::sync::Arc;
use tracing::debug;

pub struct DeployerApi {
    state: Arc<State>,
    resources: Arc<Resources>,
    authorizer: Arc<dyn Authorizer>,
}

impl FacadeFactory for DeployerApi {
    const NAME: &'static str = "Deployer";

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

impl DeployerApi {
    /// Resolve a unit tag to a unit name, allowed only when the unit is
    /// assigned to the caller's machine. Missing units are indistinguishable
    /// from foreign ones.
    fn assigned_unit(&self, tag: &str) -> Result<String, ApiError> {
        let own = Tag::parse(self.authorizer.auth_tag())?;
        let own_machine = own.machine_id().ok_or(ApiError::PermissionDenied)?;
        let name = match Tag::parse(tag) {
            Ok(Tag::Unit(name)) => name,
            _ => return Err(ApiError::PermissionDenied),
        };
        match self.state.unit(&name) {
            Ok(unit) if unit.machine_id.as_deref() == Some(own_machine) => Ok(name),
            _ => Err(ApiError::PermissionDenied),
        }
    }

    /// Start a units watcher for each owned machine. The initial set of unit
    /// names comes back with the id.
    pub async fn watch_units(&self, tags: &[String]) -> Vec<StringsWatchResult> {
        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let res = match owned_machine(self.authorizer.as_ref(), tag) {
                Ok(id) => {
                    let watcher = Arc::new(UnitsWatcher::new(self.state.clone(), &id));
                    register_strings(&self.resources, watcher).await
                }
                Err(e) => Err(e),
            };
            if let Ok((watcher_id, changes)) = &res {
                debug!(
                    tag = %tag,
                    watcher_id = %watcher_id,
                    initial = changes.len(),
                    "Units watcher registered"
                );
            }
            results.push(StringsWatchResult::from(res));
        }
        results
    }

    pub fn life(&self, tags: &[String]) -> Vec<LifeResult> {
        tags.iter()
            .map(|tag| {
                let name = self.assigned_unit(tag)?;
                Ok(self.state.unit(&name)?.life)
            })
            .map(LifeResult::from)
            .collect()
    }

    /// Remove dead units from the model.
    pub fn remove(&self, tags: &[String]) -> Vec<ErrorResult> {
        tags.iter()
            .map(|tag| {
                let name = self.assigned_unit(tag)?;
                self.state.remove_unit(&name)
            })
            .map(ErrorResult::from)
            .collect()
    }

    /// Mark units dead so they can be removed.
    pub fn ensure_dead(&self, tags: &[String]) -> Vec<ErrorResult> {
        tags.iter()
            .map(|tag| {
                let name = self.assigned_unit(tag)?;
                self.state.advance_unit_life(&name, Life::Dead)
            })
            .map(ErrorResult::from)
            .collect()
    }
}
