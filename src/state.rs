//! Reference in-memory backing store.
//!
//! Shared read-mostly across every connection as `Arc<State>`. Each mutation
//! publishes an [`EntityChange`] on a broadcast feed while the model write lock
//! is still held, so a watcher that subscribes before taking its snapshot never
//! misses a change.

pub mod model;
pub mod watchers;

pub use model::{EntityChange, Machine, Status, Unit};
pub use watchers::{EntityWatcher, MultiWatcher, UnitsWatcher};

use crate::auth::Tag;
use crate::error::ApiError;
use crate::types::{Life, MachineJob, StatusKind};
use crate::watcher::EntityInfo;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Default capacity of the change feed.
pub const DEFAULT_CHANGE_BUFFER: usize = 256;

/// Tools version reported before anything sets one.
pub const DEFAULT_AGENT_VERSION: &str = "1.0.0";

#[derive(Default)]
struct Model {
    machines: BTreeMap<String, Machine>,
    units: BTreeMap<String, Unit>,
    next_machine: u64,
    unit_seq: HashMap<String, u64>,
    environ_agent_version: String,
}

/// Backing store handle.
pub struct State {
    model: RwLock<Model>,
    changes: broadcast::Sender<EntityChange>,
    closed: watch::Sender<bool>,
}

impl State {
    /// Create a store whose change feed retains `change_buffer` entries.
    pub fn new(change_buffer: usize) -> Self {
        let (changes, _) = broadcast::channel(change_buffer.max(1));
        let (closed, _) = watch::channel(false);
        Self {
            model: RwLock::new(Model {
                environ_agent_version: DEFAULT_AGENT_VERSION.to_string(),
                ..Model::default()
            }),
            changes,
            closed,
        }
    }

    /// Subscribe to the change feed.
    pub fn subscribe(&self) -> broadcast::Receiver<EntityChange> {
        self.changes.subscribe()
    }

    /// Receiver that flips to `true` when the store closes.
    pub fn closed_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Close the store; suspended watcher fetches resolve with `StoreClosed`.
    pub fn close(&self) {
        if !self.closed.send_replace(true) {
            info!("State closed");
        }
    }

    fn write(&self) -> Result<parking_lot::RwLockWriteGuard<'_, Model>, ApiError> {
        if self.is_closed() {
            return Err(ApiError::StoreClosed);
        }
        Ok(self.model.write())
    }

    fn publish(&self, change: EntityChange) {
        debug!(change = ?change, "Publishing change");
        // no subscribers is fine
        let _ = self.changes.send(change);
    }

    pub fn add_machine(&self, jobs: Vec<MachineJob>) -> Result<Machine, ApiError> {
        if jobs.is_empty() {
            return Err(ApiError::InvalidArgument("machine needs at least one job".to_string()));
        }
        let mut model = self.write()?;
        let id = model.next_machine.to_string();
        model.next_machine += 1;
        let machine = Machine {
            id: id.clone(),
            jobs,
            life: Life::Alive,
            status: Status::default(),
            tools: None,
        };
        model.machines.insert(id.clone(), machine.clone());
        self.publish(EntityChange::Machine(id));
        Ok(machine)
    }

    /// Add a unit of `service`, optionally assigned to an alive machine.
    pub fn add_unit(&self, service: &str, machine_id: Option<&str>) -> Result<Unit, ApiError> {
        if service.is_empty() || service.contains('/') {
            return Err(ApiError::InvalidArgument(format!("invalid service name {:?}", service)));
        }
        let mut model = self.write()?;
        if let Some(id) = machine_id {
            let machine = model
                .machines
                .get(id)
                .ok_or_else(|| ApiError::NotFound(format!("machine {}", id)))?;
            if machine.life != Life::Alive {
                return Err(ApiError::InvalidArgument(format!("machine {} is not alive", id)));
            }
        }
        let seq = model.unit_seq.entry(service.to_string()).or_insert(0);
        let name = format!("{}/{}", service, seq);
        *seq += 1;
        let unit = Unit {
            name: name.clone(),
            service: service.to_string(),
            machine_id: machine_id.map(str::to_string),
            life: Life::Alive,
            status: Status::default(),
            tools: None,
        };
        model.units.insert(name.clone(), unit.clone());
        self.publish(EntityChange::Unit {
            name,
            machine_id: unit.machine_id.clone(),
            removed: None,
        });
        Ok(unit)
    }

    pub fn machine(&self, id: &str) -> Result<Machine, ApiError> {
        self.model
            .read()
            .machines
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("machine {}", id)))
    }

    pub fn unit(&self, name: &str) -> Result<Unit, ApiError> {
        self.model
            .read()
            .units
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("unit {:?}", name)))
    }

    pub fn machines(&self) -> Vec<Machine> {
        self.model.read().machines.values().cloned().collect()
    }

    pub fn units(&self) -> Vec<Unit> {
        self.model.read().units.values().cloned().collect()
    }

    /// Names of units assigned to a machine, sorted.
    pub fn units_for_machine(&self, machine_id: &str) -> Vec<String> {
        self.model
            .read()
            .units
            .values()
            .filter(|u| u.machine_id.as_deref() == Some(machine_id))
            .map(|u| u.name.clone())
            .collect()
    }

    pub fn set_machine_status(
        &self,
        id: &str,
        kind: StatusKind,
        info: &str,
    ) -> Result<(), ApiError> {
        let mut model = self.write()?;
        let machine = model
            .machines
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("machine {}", id)))?;
        machine.status = Status::new(kind, info);
        self.publish(EntityChange::Machine(id.to_string()));
        Ok(())
    }

    pub fn set_unit_status(&self, name: &str, kind: StatusKind, info: &str) -> Result<(), ApiError> {
        let mut model = self.write()?;
        let unit = model
            .units
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(format!("unit {:?}", name)))?;
        unit.status = Status::new(kind, info);
        let machine_id = unit.machine_id.clone();
        self.publish(EntityChange::Unit {
            name: name.to_string(),
            machine_id,
            removed: None,
        });
        Ok(())
    }

    /// Advance a machine's life. Going backwards is a no-op; a machine with
    /// assigned units cannot become dead.
    pub fn advance_machine_life(&self, id: &str, life: Life) -> Result<(), ApiError> {
        let mut model = self.write()?;
        let has_units = model.units.values().any(|u| u.machine_id.as_deref() == Some(id));
        let machine = model
            .machines
            .get_mut(id)
            .ok_or_else(|| ApiError::NotFound(format!("machine {}", id)))?;
        if life <= machine.life {
            return Ok(());
        }
        if life == Life::Dead && has_units {
            return Err(ApiError::InvalidArgument(format!(
                "machine {} has assigned units",
                id
            )));
        }
        machine.life = life;
        self.publish(EntityChange::Machine(id.to_string()));
        Ok(())
    }

    pub fn advance_unit_life(&self, name: &str, life: Life) -> Result<(), ApiError> {
        let mut model = self.write()?;
        let unit = model
            .units
            .get_mut(name)
            .ok_or_else(|| ApiError::NotFound(format!("unit {:?}", name)))?;
        if life <= unit.life {
            return Ok(());
        }
        unit.life = life;
        let machine_id = unit.machine_id.clone();
        self.publish(EntityChange::Unit {
            name: name.to_string(),
            machine_id,
            removed: None,
        });
        Ok(())
    }

    /// Remove a dead unit.
    pub fn remove_unit(&self, name: &str) -> Result<(), ApiError> {
        let mut model = self.write()?;
        let unit = model
            .units
            .get(name)
            .ok_or_else(|| ApiError::NotFound(format!("unit {:?}", name)))?;
        if unit.life != Life::Dead {
            return Err(ApiError::NotDead(format!("unit {:?}", name)));
        }
        let machine_id = unit.machine_id.clone();
        let removed = model.units.remove(name).map(|unit| unit.info());
        self.publish(EntityChange::Unit {
            name: name.to_string(),
            machine_id,
            removed,
        });
        Ok(())
    }

    /// Record the tools version an agent reports running.
    pub fn set_agent_tools(&self, tag: &Tag, version: &str) -> Result<(), ApiError> {
        let mut model = self.write()?;
        match tag {
            Tag::Machine(id) => {
                let machine = model
                    .machines
                    .get_mut(id)
                    .ok_or_else(|| ApiError::NotFound(format!("machine {}", id)))?;
                machine.tools = Some(version.to_string());
                self.publish(EntityChange::Machine(id.clone()));
            }
            Tag::Unit(name) => {
                let unit = model
                    .units
                    .get_mut(name)
                    .ok_or_else(|| ApiError::NotFound(format!("unit {:?}", name)))?;
                unit.tools = Some(version.to_string());
                let machine_id = unit.machine_id.clone();
                self.publish(EntityChange::Unit {
                    name: name.clone(),
                    machine_id,
                    removed: None,
                });
            }
            Tag::User(_) => {
                return Err(ApiError::InvalidArgument(format!("{} has no agent", tag)));
            }
        }
        Ok(())
    }

    /// Tools version recorded for an agent, if any.
    pub fn agent_tools(&self, tag: &Tag) -> Result<Option<String>, ApiError> {
        match tag {
            Tag::Machine(id) => Ok(self.machine(id)?.tools),
            Tag::Unit(name) => Ok(self.unit(name)?.tools),
            Tag::User(_) => Err(ApiError::InvalidArgument(format!("{} has no agent", tag))),
        }
    }

    pub fn environ_agent_version(&self) -> String {
        self.model.read().environ_agent_version.clone()
    }

    /// Set the version every agent in the environment should be running.
    pub fn set_environ_agent_version(&self, version: &str) -> Result<(), ApiError> {
        if version.is_empty() {
            return Err(ApiError::InvalidArgument("empty agent version".to_string()));
        }
        let mut model = self.write()?;
        if model.environ_agent_version == version {
            return Ok(());
        }
        model.environ_agent_version = version.to_string();
        self.publish(EntityChange::Environ);
        Ok(())
    }

    /// Current info for every machine and unit, machines first.
    pub fn all_infos(&self) -> Vec<EntityInfo> {
        let model = self.model.read();
        model
            .machines
            .values()
            .cloned()
            .map(EntityInfo::from)
            .chain(model.units.values().cloned().map(EntityInfo::from))
            .collect()
    }

    pub(crate) fn machine_info(&self, id: &str) -> Option<EntityInfo> {
        self.model.read().machines.get(id).cloned().map(EntityInfo::from)
    }

    pub(crate) fn unit_info(&self, name: &str) -> Option<EntityInfo> {
        self.model.read().units.get(name).cloned().map(EntityInfo::from)
    }
}

impl Default for State {
    fn default() -> Self {
        Self::new(DEFAULT_CHANGE_BUFFER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_machine_ids_are_sequential() {
        let st = State::default();
        assert_eq!(st.add_machine(vec![MachineJob::HostUnits]).unwrap().id, "0");
        assert_eq!(st.add_machine(vec![MachineJob::HostUnits]).unwrap().id, "1");
        assert!(st.add_machine(vec![]).is_err());
    }

    #[test]
    fn test_unit_names_and_assignment() {
        let st = State::default();
        let m = st.add_machine(vec![MachineJob::HostUnits]).unwrap();
        let u0 = st.add_unit("wordpress", Some(&m.id)).unwrap();
        let u1 = st.add_unit("wordpress", None).unwrap();
        assert_eq!(u0.name, "wordpress/0");
        assert_eq!(u1.name, "wordpress/1");
        assert_eq!(st.units_for_machine(&m.id), vec!["wordpress/0".to_string()]);
        assert!(matches!(
            st.add_unit("mysql", Some("42")),
            Err(ApiError::NotFound(_))
        ));
    }

    #[test]
    fn test_life_only_advances() {
        let st = State::default();
        let m = st.add_machine(vec![MachineJob::HostUnits]).unwrap();
        st.advance_machine_life(&m.id, Life::Dying).unwrap();
        st.advance_machine_life(&m.id, Life::Alive).unwrap();
        assert_eq!(st.machine(&m.id).unwrap().life, Life::Dying);
    }

    #[test]
    fn test_machine_with_units_cannot_die() {
        let st = State::default();
        let m = st.add_machine(vec![MachineJob::HostUnits]).unwrap();
        st.add_unit("mysql", Some(&m.id)).unwrap();
        assert!(matches!(
            st.advance_machine_life(&m.id, Life::Dead),
            Err(ApiError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_remove_requires_dead_unit() {
        let st = State::default();
        let u = st.add_unit("mysql", None).unwrap();
        assert!(matches!(st.remove_unit(&u.name), Err(ApiError::NotDead(_))));
        st.advance_unit_life(&u.name, Life::Dead).unwrap();
        let mut rx = st.subscribe();
        st.remove_unit(&u.name).unwrap();
        assert!(st.unit(&u.name).is_err());

        match rx.try_recv().unwrap() {
            EntityChange::Unit { removed: Some(last), .. } => {
                assert_eq!(last.name, u.name);
                assert_eq!(last.life, Life::Dead);
            }
            other => panic!("unexpected change {:?}", other),
        }
    }

    #[test]
    fn test_mutations_publish_changes() {
        let st = State::default();
        let mut rx = st.subscribe();
        let m = st.add_machine(vec![MachineJob::HostUnits]).unwrap();
        st.add_unit("mysql", Some(&m.id)).unwrap();
        st.set_environ_agent_version("1.2.0").unwrap();

        assert_eq!(rx.try_recv().unwrap(), EntityChange::Machine("0".to_string()));
        assert_eq!(
            rx.try_recv().unwrap(),
            EntityChange::Unit {
                name: "mysql/0".to_string(),
                machine_id: Some("0".to_string()),
                removed: None,
            }
        );
        assert_eq!(rx.try_recv().unwrap(), EntityChange::Environ);
    }

    #[test]
    fn test_closed_store_rejects_mutation() {
        let st = State::default();
        st.close();
        assert!(st.is_closed());
        assert_eq!(
            st.add_machine(vec![MachineJob::HostUnits]).unwrap_err(),
            ApiError::StoreClosed
        );
    }

    #[test]
    fn test_agent_tools() {
        let st = State::default();
        let m = st.add_machine(vec![MachineJob::HostUnits]).unwrap();
        let tag = Tag::Machine(m.id.clone());
        assert_eq!(st.agent_tools(&tag).unwrap(), None);
        st.set_agent_tools(&tag, "1.1.0").unwrap();
        assert_eq!(st.agent_tools(&tag).unwrap(), Some("1.1.0".to_string()));
        assert!(st.set_agent_tools(&Tag::User("bob".into()), "1").is_err());
    }
}
