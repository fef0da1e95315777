//! Core types shared by the authorization layer and the backing store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an entry in a connection's resource registry.
pub type ResourceId = String;

/// Lifecycle of a machine or unit. Life only ever advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Life {
    Alive,
    Dying,
    Dead,
}

impl fmt::Display for Life {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Life::Alive => "alive",
            Life::Dying => "dying",
            Life::Dead => "dead",
        };
        f.write_str(s)
    }
}

/// Work a machine agent is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MachineJob {
    /// Runs unit agents.
    HostUnits,
    /// Manages the environment (provisioning, firewalling). Privileged.
    ManageEnviron,
    /// Runs the state server.
    ManageState,
}

/// Agent-reported status of a machine or unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Pending,
    Started,
    Stopped,
    Error,
    Down,
}

impl Default for StatusKind {
    fn default() -> Self {
        StatusKind::Pending
    }
}
