//! apiroot: per-connection API root for a cluster controller.
//!
//! After a connection authenticates, the server builds a [`Root`] for it. The
//! root hands out role-gated facades, tracks every watcher the connection
//! starts in a private resource registry, resolves watcher ids to typed
//! wrappers, and stops everything when the connection is torn down.

pub mod auth;
pub mod config;
pub mod error;
pub mod facade;
pub mod logging;
pub mod resource;
pub mod root;
pub mod server;
pub mod state;
pub mod tooling;
pub mod types;
pub mod watcher;

pub use auth::{AuthPolicy, Authorizer, Entity, Tag};
pub use config::{ConfigLoader, ServerConfig};
pub use error::ApiError;
pub use resource::{Registered, Resource, Resources};
pub use root::{Lifecycle, Root};
pub use server::Server;
pub use state::State;
