//! Facades served by the API root.
//!
//! A facade is built per request by the root once the placeholder id and role
//! gate have been checked. Construction only captures shared handles; the
//! registry grows only when a facade method starts a watcher.

pub mod client;
pub mod deployer;
pub mod machine_agent;
pub mod machiner;
pub mod params;
pub mod pinger;
pub mod upgrader;

pub use client::ClientApi;
pub use deployer::DeployerApi;
pub use machine_agent::MachineAgentApi;
pub use machiner::MachinerApi;
pub use pinger::Pinger;
pub use upgrader::UpgraderApi;

use crate::auth::{Authorizer, Tag};
use crate::error::ApiError;
use crate::resource::{Registered, Resources};
use crate::state::State;
use crate::types::ResourceId;
use crate::watcher::{NotifyWatcher, StringsWatcher};
use std::sync::Arc;
use tracing::warn;

/// Construction contract shared by every facade kind.
pub trait FacadeFactory: Sized {
    /// Name used in logs.
    const NAME: &'static str;

    /// Build the facade, applying its own finer authorization gate.
    fn construct(
        state: &Arc<State>,
        resources: &Arc<Resources>,
        authorizer: &Arc<dyn Authorizer>,
    ) -> Result<Self, ApiError>;
}

/// Parse `tag` and require that the caller owns it.
///
/// Malformed tags are reported as `PermissionDenied` so that callers cannot
/// discover entities they do not own.
pub(crate) fn owned_tag(authorizer: &dyn Authorizer, tag: &str) -> Result<Tag, ApiError> {
    if !authorizer.auth_owner(tag) {
        return Err(ApiError::PermissionDenied);
    }
    Tag::parse(tag).map_err(|_| ApiError::PermissionDenied)
}

/// Machine id from a tag the caller owns.
pub(crate) fn owned_machine(authorizer: &dyn Authorizer, tag: &str) -> Result<String, ApiError> {
    match owned_tag(authorizer, tag)? {
        Tag::Machine(id) => Ok(id),
        _ => Err(ApiError::PermissionDenied),
    }
}

/// Consume the initial event, then register the watcher.
pub(crate) async fn register_notify(
    resources: &Resources,
    watcher: Arc<dyn NotifyWatcher>,
) -> Result<ResourceId, ApiError> {
    if let Err(err) = watcher.next().await {
        if let Err(e) = watcher.stop() {
            warn!(error = %e, "Failed to stop notify watcher after initial event");
        }
        return Err(err);
    }
    resources.register(Registered::Notify(watcher))
}

/// Consume the initial batch, then register the watcher. The batch is handed
/// back so the caller sees it alongside the id.
pub(crate) async fn register_strings(
    resources: &Resources,
    watcher: Arc<dyn StringsWatcher>,
) -> Result<(ResourceId, Vec<String>), ApiError> {
    let changes = match watcher.next().await {
        Ok(changes) => changes,
        Err(err) => {
            if let Err(e) = watcher.stop() {
                warn!(error = %e, "Failed to stop strings watcher after initial batch");
            }
            return Err(err);
        }
    };
    let id = resources.register(Registered::Strings(watcher))?;
    Ok((id, changes))
}
