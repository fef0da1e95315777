//! Upgrader facade: tells agents which tools version to run and records the
//! version they report.

use super::params::{ErrorResult, NotifyWatchResult, SetTools, ToolsResult};
use super::{owned_tag, register_notify, FacadeFactory};
use crate::auth::{Authorizer, Tag};
use crate::error::ApiError;
use crate::resource::Resources;
use crate::state::{EntityWatcher, State};
use std::sync::Arc;
use tracing::debug;

pub struct UpgraderApi {
    state: Arc<State>,
    resources: Arc<Resources>,
    authorizer: Arc<dyn Authorizer>,
}

impl FacadeFactory for UpgraderApi {
    const NAME: &'static str = "Upgrader";

    fn construct(
        state: &Arc<State>,
        resources: &Arc<Resources>,
        authorizer: &Arc<dyn Authorizer>,
    ) -> Result<Self, ApiError> {
        if !authorizer.auth_machine_agent() && !authorizer.auth_unit_agent() {
            return Err(ApiError::PermissionDenied);
        }
        Ok(Self {
            state: state.clone(),
            resources: resources.clone(),
            authorizer: authorizer.clone(),
        })
    }
}

impl UpgraderApi {
    fn agent_tag(&self, tag: &str) -> Result<Tag, ApiError> {
        match owned_tag(self.authorizer.as_ref(), tag)? {
            Tag::User(_) => Err(ApiError::PermissionDenied),
            agent => Ok(agent),
        }
    }

    /// Watch the environment's desired agent version. The environ manager may
    /// watch on behalf of any agent.
    pub async fn watch_api_version(&self, tags: &[String]) -> Vec<NotifyWatchResult> {
        let mut results = Vec::with_capacity(tags.len());
        for tag in tags {
            let allowed = self.authorizer.auth_environ_manager() || self.agent_tag(tag).is_ok();
            let res = if allowed {
                let watcher = Arc::new(EntityWatcher::for_environ(&self.state));
                register_notify(&self.resources, watcher).await
            } else {
                Err(ApiError::PermissionDenied)
            };
            if let Ok(watcher_id) = &res {
                debug!(tag = %tag, watcher_id = %watcher_id, "Version watcher registered");
            }
            results.push(NotifyWatchResult::from(res));
        }
        results
    }

    /// The version each agent should be running.
    pub fn tools(&self, tags: &[String]) -> Vec<ToolsResult> {
        tags.iter()
            .map(|tag| {
                let agent = self.agent_tag(tag)?;
                // the agent must still exist
                self.state.agent_tools(&agent)?;
                Ok(self.state.environ_agent_version())
            })
            .map(ToolsResult::from)
            .collect()
    }

    /// Record the version each agent reports running.
    pub fn set_tools(&self, args: &[SetTools]) -> Vec<ErrorResult> {
        args.iter()
            .map(|arg| {
                let agent = self.agent_tag(&arg.tag)?;
                if arg.version.is_empty() {
                    return Err(ApiError::InvalidArgument("empty tools version".to_string()));
                }
                self.state.set_agent_tools(&agent, &arg.version)
            })
            .map(ErrorResult::from)
            .collect()
    }
}
