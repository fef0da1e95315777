//! Per-connection resource registry.

pub mod contract;
pub mod registry;

pub use contract::Resource;
pub use registry::{Registered, Resources};
