//! Registrable resource contract.

use crate::error::ApiError;

/// Anything the registry tracks must be stoppable.
///
/// `stop` must be safe to call more than once and must wake any caller
/// suspended on the resource.
pub trait Resource: Send + Sync {
    fn stop(&self) -> Result<(), ApiError>;
}
