//! Authentication identities and the authorization policy.
//!
//! An [`Entity`] is handed to the API root after login. The root wraps it in an
//! [`AuthPolicy`] once; facades only ever see it through the [`Authorizer`]
//! trait.

pub mod entity;
pub mod policy;

pub use entity::{Entity, Tag};
pub use policy::{AuthPolicy, Authorizer};
