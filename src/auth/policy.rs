//! Role gates and capability queries for the authenticated entity.

use super::entity::Entity;
use crate::error::ApiError;
use crate::types::MachineJob;

/// Capability queries exposed to facades.
///
/// All queries are pure: no I/O, no mutation, no failure. Facades receive an
/// `Arc<dyn Authorizer>` at construction time and use it for per-object checks.
pub trait Authorizer: Send + Sync {
    /// Whether the entity is a machine agent.
    fn auth_machine_agent(&self) -> bool;

    /// Whether the entity is a unit agent.
    fn auth_unit_agent(&self) -> bool;

    /// Whether the entity's tag equals `tag`.
    fn auth_owner(&self, tag: &str) -> bool;

    /// Whether the entity is a machine running the ManageEnviron job.
    fn auth_environ_manager(&self) -> bool;

    /// Whether the entity is an interactive client rather than an agent.
    fn auth_client(&self) -> bool;

    /// The entity's identity tag.
    fn auth_tag(&self) -> &str;
}

/// Authorization policy for one connection.
#[derive(Debug, Clone)]
pub struct AuthPolicy {
    entity: Entity,
    tag: String,
}

impl AuthPolicy {
    pub fn new(entity: Entity) -> Self {
        let tag = entity.tag();
        Self { entity, tag }
    }

    pub fn entity(&self) -> &Entity {
        &self.entity
    }

    /// Fails with `PermissionDenied` unless the entity is an agent.
    pub fn require_agent(&self) -> Result<(), ApiError> {
        if !self.entity.is_agent() {
            return Err(ApiError::PermissionDenied);
        }
        Ok(())
    }

    /// Fails with `PermissionDenied` unless the entity is a client.
    pub fn require_client(&self) -> Result<(), ApiError> {
        if self.entity.is_agent() {
            return Err(ApiError::PermissionDenied);
        }
        Ok(())
    }
}

impl Authorizer for AuthPolicy {
    fn auth_machine_agent(&self) -> bool {
        matches!(self.entity, Entity::Machine { .. })
    }

    fn auth_unit_agent(&self) -> bool {
        matches!(self.entity, Entity::Unit { .. })
    }

    fn auth_owner(&self, tag: &str) -> bool {
        self.tag == tag
    }

    fn auth_environ_manager(&self) -> bool {
        self.entity.has_job(MachineJob::ManageEnviron)
    }

    fn auth_client(&self) -> bool {
        !self.entity.is_agent()
    }

    fn auth_tag(&self) -> &str {
        &self.tag
    }
}
