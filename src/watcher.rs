//! Watcher contracts and the per-connection wrappers handed to callers.

pub mod contract;
pub mod wrappers;

pub use contract::{AllWatcher, Delta, EntityInfo, MachineInfo, NotifyWatcher, StringsWatcher, UnitInfo};
pub use wrappers::{AllWatcherApi, NotifyWatcherApi, StringsWatcherApi};
