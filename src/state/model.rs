//! Entities held by the reference backing store.

use crate::auth::Tag;
use crate::types::{Life, MachineJob, StatusKind};
use crate::watcher::{EntityInfo, MachineInfo, UnitInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub kind: StatusKind,
    pub info: String,
    pub since: DateTime<Utc>,
}

impl Status {
    pub fn new(kind: StatusKind, info: impl Into<String>) -> Self {
        Self {
            kind,
            info: info.into(),
            since: Utc::now(),
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::new(StatusKind::Pending, "")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub jobs: Vec<MachineJob>,
    pub life: Life,
    pub status: Status,
    /// Tools version the machine agent reports running.
    pub tools: Option<String>,
}

impl Machine {
    pub fn tag(&self) -> String {
        Tag::for_machine(&self.id)
    }

    pub fn info(&self) -> MachineInfo {
        MachineInfo {
            id: self.id.clone(),
            life: self.life,
            jobs: self.jobs.clone(),
            status: self.status.kind,
            status_info: self.status.info.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// `<service>/<n>`
    pub name: String,
    pub service: String,
    pub machine_id: Option<String>,
    pub life: Life,
    pub status: Status,
    pub tools: Option<String>,
}

impl Unit {
    pub fn tag(&self) -> String {
        Tag::for_unit(&self.name)
    }

    pub fn info(&self) -> UnitInfo {
        UnitInfo {
            name: self.name.clone(),
            service: self.service.clone(),
            machine_id: self.machine_id.clone(),
            life: self.life,
            status: self.status.kind,
            status_info: self.status.info.clone(),
        }
    }
}

/// Change published by the store after every mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityChange {
    Machine(String),
    /// Carries the unit's machine so watchers can route removals, and the
    /// unit's final info when the change is its removal.
    Unit {
        name: String,
        machine_id: Option<String>,
        removed: Option<UnitInfo>,
    },
    Environ,
}

impl From<Machine> for EntityInfo {
    fn from(m: Machine) -> Self {
        EntityInfo::Machine(m.info())
    }
}

impl From<Unit> for EntityInfo {
    fn from(u: Unit) -> Self {
        EntityInfo::Unit(u.info())
    }
}
