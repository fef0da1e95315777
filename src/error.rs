//! Error types for the API root.
//!
//! Every request-level failure is an [`ApiError`]. The three dispatch errors
//! (`PermissionDenied`, `BadIdentifier`, `UnknownResource`) are raised before any
//! facade is built or any registry entry is touched.

use thiserror::Error;

/// Error codes carried alongside error messages so that a transport can map
/// failures without string matching on the message.
pub mod codes {
    pub const UNAUTHORIZED: &str = "unauthorized access";
    pub const NOT_FOUND: &str = "not found";
    pub const STOPPED: &str = "stopped";
    pub const CLOSED: &str = "closed";
    pub const SHUT_DOWN: &str = "shut down";
    pub const NOT_DEAD: &str = "not dead";
    pub const INVALID_ARGUMENT: &str = "invalid argument";
    pub const CONFIG: &str = "config error";
}

/// API error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The authenticated entity may not perform the operation.
    #[error("permission denied")]
    PermissionDenied,

    /// A facade was addressed with an identifier other than the empty string.
    #[error("id not found")]
    BadIdentifier,

    /// No resource of the requested category is registered under the id.
    #[error("unknown watcher id")]
    UnknownResource,

    /// The watcher was stopped while (or before) a caller waited on it.
    #[error("watcher was stopped")]
    StoppedWatcher,

    /// The backing store closed underneath a watcher.
    #[error("state has been closed")]
    StoreClosed,

    /// The connection root has been torn down.
    #[error("connection is shut down")]
    Terminated,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} is not dead")]
    NotDead(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ApiError {
    /// Wire-level error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::PermissionDenied => codes::UNAUTHORIZED,
            ApiError::BadIdentifier | ApiError::UnknownResource | ApiError::NotFound(_) => {
                codes::NOT_FOUND
            }
            ApiError::StoppedWatcher => codes::STOPPED,
            ApiError::StoreClosed => codes::CLOSED,
            ApiError::Terminated => codes::SHUT_DOWN,
            ApiError::NotDead(_) => codes::NOT_DEAD,
            ApiError::InvalidArgument(_) => codes::INVALID_ARGUMENT,
            ApiError::ConfigError(_) => codes::CONFIG,
        }
    }

    /// True for errors that mean a watcher has reached the end of its stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, ApiError::StoppedWatcher | ApiError::StoreClosed)
    }
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}
