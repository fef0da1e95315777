//! Watcher capability contracts.
//!
//! Three categories share one shape: a suspending `next` and the `stop` inherited
//! from [`Resource`]. `next` resolves when a change is available, when the
//! watcher is stopped (`StoppedWatcher`), or when the backing store closes
//! (`StoreClosed`).

use crate::error::ApiError;
use crate::resource::Resource;
use crate::types::{Life, MachineJob, StatusKind};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Single-value change notification.
#[async_trait]
pub trait NotifyWatcher: Resource {
    async fn next(&self) -> Result<(), ApiError>;
}

/// Batched string-list change notification.
#[async_trait]
pub trait StringsWatcher: Resource {
    async fn next(&self) -> Result<Vec<String>, ApiError>;
}

/// Aggregated incremental delta stream over the whole model.
#[async_trait]
pub trait AllWatcher: Resource {
    async fn next(&self) -> Result<Vec<Delta>, ApiError>;
}

/// One entry of an aggregated delta stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(rename = "Removed")]
    pub removed: bool,
    #[serde(rename = "Entity")]
    pub entity: EntityInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityInfo {
    #[serde(rename = "machine")]
    Machine(MachineInfo),
    #[serde(rename = "unit")]
    Unit(UnitInfo),
}

impl EntityInfo {
    /// Key identifying the entity within its kind.
    pub fn key(&self) -> (&'static str, &str) {
        match self {
            EntityInfo::Machine(m) => ("machine", &m.id),
            EntityInfo::Unit(u) => ("unit", &u.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MachineInfo {
    pub id: String,
    pub life: Life,
    pub jobs: Vec<MachineJob>,
    pub status: StatusKind,
    pub status_info: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitInfo {
    pub name: String,
    pub service: String,
    pub machine_id: Option<String>,
    pub life: Life,
    pub status: StatusKind,
    pub status_info: String,
}
