//! Per-connection API root.
//!
//! A [`Root`] is created after login and lives as long as the connection. It
//! owns the connection's resource registry and authorization policy, hands out
//! facades behind the placeholder-id check and role gate, and resolves watcher
//! ids to typed wrappers. [`Root::kill`] tears the connection down.

use crate::auth::{AuthPolicy, Authorizer, Entity};
use crate::error::ApiError;
use crate::facade::params::{AllWatcherId, ClientStatus};
use crate::facade::{
    ClientApi, DeployerApi, FacadeFactory, MachineAgentApi, MachinerApi, Pinger, UpgraderApi,
};
use crate::resource::{Registered, Resources};
use crate::state::State;
use crate::watcher::{AllWatcherApi, NotifyWatcherApi, StringsWatcherApi};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Authenticated, nothing served yet.
    Created,
    /// Serving requests.
    Active,
    /// Torn down; terminal.
    Terminated,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Created => "created",
            Lifecycle::Active => "active",
            Lifecycle::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy)]
enum Gate {
    Agent,
    Client,
}

/// The API root for one authenticated connection.
pub struct Root {
    state: Arc<State>,
    resources: Arc<Resources>,
    policy: Arc<AuthPolicy>,
    authorizer: Arc<dyn Authorizer>,
    client: Arc<ClientApi>,
    lifecycle: RwLock<Lifecycle>,
}

impl Root {
    /// Build the root for an authenticated entity.
    pub fn new(state: Arc<State>, entity: Entity) -> Self {
        let resources = Arc::new(Resources::new());
        let policy = Arc::new(AuthPolicy::new(entity));
        let authorizer: Arc<dyn Authorizer> = policy.clone();
        let client = Arc::new(ClientApi::new(state.clone(), resources.clone()));
        debug!(tag = %policy.auth_tag(), "API root created");
        Self {
            state,
            resources,
            policy,
            authorizer,
            client,
            lifecycle: RwLock::new(Lifecycle::Created),
        }
    }

    pub fn entity(&self) -> &Entity {
        self.policy.entity()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self.lifecycle.read()
    }

    /// The connection's resource registry.
    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    /// Capability queries for the connection's entity.
    pub fn authorizer(&self) -> &Arc<dyn Authorizer> {
        &self.authorizer
    }

    pub fn require_agent(&self) -> Result<(), ApiError> {
        self.policy.require_agent()
    }

    pub fn require_client(&self) -> Result<(), ApiError> {
        self.policy.require_client()
    }

    /// Fail once terminated; otherwise mark the root active.
    ///
    /// The returned guard keeps `kill` out until the caller is done, so nothing
    /// is constructed after teardown begins.
    fn enter(&self) -> Result<RwLockReadGuard<'_, Lifecycle>, ApiError> {
        let lifecycle = self.lifecycle.read();
        let current = *lifecycle;
        match current {
            Lifecycle::Terminated => return Err(ApiError::Terminated),
            Lifecycle::Active => return Ok(lifecycle),
            Lifecycle::Created => drop(lifecycle),
        }
        let mut lifecycle = self.lifecycle.write();
        let current = *lifecycle;
        match current {
            Lifecycle::Terminated => return Err(ApiError::Terminated),
            Lifecycle::Active => {}
            Lifecycle::Created => {
                *lifecycle = Lifecycle::Active;
                debug!(tag = %self.policy.auth_tag(), "API root active");
            }
        }
        Ok(RwLockWriteGuard::downgrade(lifecycle))
    }

    fn gate(&self, gate: Gate) -> Result<(), ApiError> {
        match gate {
            Gate::Agent => self.policy.require_agent(),
            Gate::Client => self.policy.require_client(),
        }
    }

    fn facade<F: FacadeFactory>(&self, id: &str, gate: Gate) -> Result<F, ApiError> {
        let _lifecycle = self.enter()?;
        if !id.is_empty() {
            return Err(ApiError::BadIdentifier);
        }
        self.gate(gate)?;
        let facade = F::construct(&self.state, &self.resources, &self.authorizer)?;
        debug!(facade = F::NAME, tag = %self.policy.auth_tag(), "Facade constructed");
        Ok(facade)
    }

    pub fn machiner(&self, id: &str) -> Result<MachinerApi, ApiError> {
        self.facade(id, Gate::Agent)
    }

    pub fn machine_agent(&self, id: &str) -> Result<MachineAgentApi, ApiError> {
        self.facade(id, Gate::Agent)
    }

    pub fn deployer(&self, id: &str) -> Result<DeployerApi, ApiError> {
        self.facade(id, Gate::Agent)
    }

    pub fn upgrader(&self, id: &str) -> Result<UpgraderApi, ApiError> {
        self.facade(id, Gate::Agent)
    }

    /// The connection's client facade.
    pub fn client(&self, id: &str) -> Result<Arc<ClientApi>, ApiError> {
        let _lifecycle = self.enter()?;
        if !id.is_empty() {
            return Err(ApiError::BadIdentifier);
        }
        self.gate(Gate::Client)?;
        Ok(self.client.clone())
    }

    /// Liveness facade. Any authenticated entity may use it.
    pub fn pinger(&self, id: &str) -> Result<Pinger, ApiError> {
        let _lifecycle = self.enter()?;
        if !id.is_empty() {
            return Err(ApiError::BadIdentifier);
        }
        Ok(Pinger)
    }

    pub fn notify_watcher(&self, id: &str) -> Result<NotifyWatcherApi, ApiError> {
        let _lifecycle = self.enter()?;
        match self.resources.get(id)? {
            Registered::Notify(watcher) => {
                self.gate(Gate::Agent)?;
                Ok(NotifyWatcherApi::new(watcher, id.to_string(), self.resources.clone()))
            }
            _ => Err(ApiError::UnknownResource),
        }
    }

    pub fn strings_watcher(&self, id: &str) -> Result<StringsWatcherApi, ApiError> {
        let _lifecycle = self.enter()?;
        match self.resources.get(id)? {
            Registered::Strings(watcher) => {
                self.gate(Gate::Agent)?;
                Ok(StringsWatcherApi::new(watcher, id.to_string(), self.resources.clone()))
            }
            _ => Err(ApiError::UnknownResource),
        }
    }

    pub fn all_watcher(&self, id: &str) -> Result<AllWatcherApi, ApiError> {
        let _lifecycle = self.enter()?;
        match self.resources.get(id)? {
            Registered::All(watcher) => {
                self.gate(Gate::Client)?;
                Ok(AllWatcherApi::new(watcher, id.to_string(), self.resources.clone()))
            }
            _ => Err(ApiError::UnknownResource),
        }
    }

    /// Status through the client facade.
    pub fn status(&self) -> Result<ClientStatus, ApiError> {
        self.client("")?.status()
    }

    /// Start an all-entities watcher through the client facade.
    pub fn watch_all(&self) -> Result<AllWatcherId, ApiError> {
        self.client("")?.watch_all()
    }

    /// Tear the connection down: stop every registered resource and refuse
    /// further requests. Calling it again does nothing.
    pub fn kill(&self) {
        {
            let mut lifecycle = self.lifecycle.write();
            if *lifecycle == Lifecycle::Terminated {
                return;
            }
            *lifecycle = Lifecycle::Terminated;
        }
        let count = self.resources.count();
        self.resources.shutdown();
        info!(tag = %self.policy.auth_tag(), resources = count, "API root terminated");
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Root")
            .field("entity", self.policy.entity())
            .field("lifecycle", &self.lifecycle())
            .field("resources", &self.resources.count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::state::EntityWatcher;
    use crate::types::MachineJob;
    use std::time::Duration;

    /// Remembers whether teardown had begun while it was being built.
    struct Witness {
        after_teardown: bool,
    }

    impl FacadeFactory for Witness {
        const NAME: &'static str = "Witness";

        fn construct(
            _state: &Arc<State>,
            resources: &Arc<Resources>,
            _authorizer: &Arc<dyn Authorizer>,
        ) -> Result<Self, ApiError> {
            std::thread::yield_now();
            Ok(Self {
                after_teardown: resources.is_closed(),
            })
        }
    }

    fn agent_root() -> Root {
        let state = Arc::new(State::default());
        state.add_machine(vec![MachineJob::HostUnits]).unwrap();
        Root::new(state, Entity::machine("0", vec![MachineJob::HostUnits]))
    }

    fn client_root() -> Root {
        Root::new(Arc::new(State::default()), Entity::user("admin"))
    }

    #[test]
    fn test_lifecycle_transitions() {
        let root = agent_root();
        assert_eq!(root.lifecycle(), Lifecycle::Created);
        assert!(matches!(root.pinger("whatever"), Err(ApiError::BadIdentifier)));
        assert_eq!(root.lifecycle(), Lifecycle::Active);
        root.pinger("").unwrap().ping();
        assert_eq!(root.lifecycle(), Lifecycle::Active);
        root.kill();
        assert_eq!(root.lifecycle(), Lifecycle::Terminated);
        root.kill();
        assert_eq!(root.lifecycle(), Lifecycle::Terminated);
        assert!(matches!(root.pinger(""), Err(ApiError::Terminated)));
    }

    #[test]
    fn test_bad_identifier_before_role_gate() {
        let client = client_root();
        assert!(matches!(client.machiner("x"), Err(ApiError::BadIdentifier)));
        assert!(matches!(client.machiner(""), Err(ApiError::PermissionDenied)));

        let agent = agent_root();
        assert!(matches!(agent.client(" "), Err(ApiError::BadIdentifier)));
        assert!(matches!(agent.client(""), Err(ApiError::PermissionDenied)));
        assert_eq!(agent.resources().count(), 0);
    }

    #[test]
    fn test_agent_facades() {
        let agent = agent_root();
        assert!(agent.machiner("").is_ok());
        assert!(agent.machine_agent("").is_ok());
        assert!(agent.deployer("").is_ok());
        assert!(agent.upgrader("").is_ok());
        assert!(agent.status().is_err());
    }

    #[test]
    fn test_unit_agent_passes_gate_but_not_machiner() {
        let root = Root::new(Arc::new(State::default()), Entity::unit("mysql/0"));
        assert!(matches!(root.machiner(""), Err(ApiError::PermissionDenied)));
        assert!(root.upgrader("").is_ok());
    }

    #[test]
    fn test_watcher_accessor_checks_category_then_role() {
        let agent = agent_root();
        let watcher = Arc::new(EntityWatcher::for_environ(&agent.state));
        let id = agent.resources().register(Registered::Notify(watcher)).unwrap();

        assert!(agent.notify_watcher(&id).is_ok());
        assert!(matches!(agent.strings_watcher(&id), Err(ApiError::UnknownResource)));
        assert!(matches!(agent.all_watcher(&id), Err(ApiError::UnknownResource)));
        assert!(matches!(agent.notify_watcher("99"), Err(ApiError::UnknownResource)));
    }

    #[test]
    fn test_client_cannot_use_agent_watchers() {
        let client = client_root();
        let watcher = Arc::new(EntityWatcher::for_environ(&client.state));
        let id = client.resources().register(Registered::Notify(watcher)).unwrap();
        assert!(matches!(client.notify_watcher(&id), Err(ApiError::PermissionDenied)));

        let AllWatcherId { all_watcher_id } = client.watch_all().unwrap();
        assert!(client.all_watcher(&all_watcher_id).is_ok());
    }

    #[test]
    fn test_kill_stops_everything_and_closes_registry() {
        let client = client_root();
        client.watch_all().unwrap();
        client.watch_all().unwrap();
        assert_eq!(client.resources().count(), 2);

        client.kill();
        assert_eq!(client.resources().count(), 0);
        assert!(matches!(client.watch_all(), Err(ApiError::Terminated)));
        assert!(matches!(client.all_watcher("1"), Err(ApiError::Terminated)));

        // a registration racing with teardown is refused and stopped
        let late = Arc::new(EntityWatcher::for_environ(&client.state));
        assert_eq!(
            client.resources().register(Registered::Notify(late.clone())),
            Err(ApiError::Terminated)
        );
        late.stop().unwrap();
    }

    #[test]
    fn test_kill_waits_for_facades_under_construction() {
        let root = agent_root();
        std::thread::scope(|scope| {
            let builders: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| loop {
                        match root.facade::<Witness>("", Gate::Agent) {
                            Ok(witness) => assert!(!witness.after_teardown),
                            Err(e) => {
                                assert_eq!(e, ApiError::Terminated);
                                break;
                            }
                        }
                    })
                })
                .collect();
            std::thread::sleep(Duration::from_millis(20));
            root.kill();
            for builder in builders {
                builder.join().unwrap();
            }
        });
        assert_eq!(root.lifecycle(), Lifecycle::Terminated);
    }
}
