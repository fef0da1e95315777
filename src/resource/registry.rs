//! Resource registry: the per-connection table of watchers and other
//! stoppable resources.
//!
//! Entries are a closed set of categories ([`Registered`]), so a caller asking
//! for one watcher category can never be handed another. Lookup and mutation
//! share a single mutex; `stop` on a resource is only ever called after its
//! entry has been detached and the lock released, so a slow or failing stop
//! cannot stall other requests on the connection.

use super::contract::Resource;
use crate::error::ApiError;
use crate::types::ResourceId;
use crate::watcher::{AllWatcher, NotifyWatcher, StringsWatcher};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A registry entry, tagged by watcher category.
#[derive(Clone)]
pub enum Registered {
    Notify(Arc<dyn NotifyWatcher>),
    Strings(Arc<dyn StringsWatcher>),
    All(Arc<dyn AllWatcher>),
    Other(Arc<dyn Resource>),
}

impl Registered {
    pub fn kind(&self) -> &'static str {
        match self {
            Registered::Notify(_) => "notify",
            Registered::Strings(_) => "strings",
            Registered::All(_) => "all",
            Registered::Other(_) => "other",
        }
    }

    fn stop(&self) -> Result<(), ApiError> {
        match self {
            Registered::Notify(w) => w.stop(),
            Registered::Strings(w) => w.stop(),
            Registered::All(w) => w.stop(),
            Registered::Other(r) => r.stop(),
        }
    }
}

impl fmt::Debug for Registered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Registered::{}", self.kind())
    }
}

struct Inner {
    /// Last issued id; ids are never reused within a registry.
    max_id: u64,
    entries: HashMap<ResourceId, Registered>,
    closed: bool,
}

/// Per-connection resource registry.
pub struct Resources {
    inner: Mutex<Inner>,
}

impl Resources {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                max_id: 0,
                entries: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Register a resource and return its fresh id.
    ///
    /// After [`shutdown`](Self::shutdown) the resource is stopped straight away
    /// and `Terminated` is returned.
    pub fn register(&self, resource: Registered) -> Result<ResourceId, ApiError> {
        let id = {
            let mut inner = self.inner.lock();
            if inner.closed {
                None
            } else {
                inner.max_id += 1;
                let id = inner.max_id.to_string();
                inner.entries.insert(id.clone(), resource.clone());
                Some(id)
            }
        };

        match id {
            Some(id) => {
                debug!(resource_id = %id, kind = resource.kind(), "Registered resource");
                Ok(id)
            }
            None => {
                if let Err(e) = resource.stop() {
                    warn!(kind = resource.kind(), error = %e, "Failed to stop resource rejected after shutdown");
                }
                Err(ApiError::Terminated)
            }
        }
    }

    /// Look up a resource. Category checks are the caller's business.
    pub fn get(&self, id: &str) -> Result<Registered, ApiError> {
        self.inner
            .lock()
            .entries
            .get(id)
            .cloned()
            .ok_or(ApiError::UnknownResource)
    }

    /// Remove and stop one resource. Stopping an unknown id is a no-op.
    pub fn stop(&self, id: &str) -> Result<(), ApiError> {
        let removed = self.inner.lock().entries.remove(id);
        match removed {
            Some(resource) => {
                debug!(resource_id = %id, kind = resource.kind(), "Stopping resource");
                resource.stop()
            }
            None => Ok(()),
        }
    }

    /// Remove and stop every resource.
    ///
    /// Each stop is attempted independently; failures are logged and do not
    /// prevent the rest from being stopped. The registry stays usable.
    pub fn stop_all(&self) {
        let drained: Vec<(ResourceId, Registered)> =
            std::mem::take(&mut self.inner.lock().entries).into_iter().collect();
        if drained.is_empty() {
            return;
        }

        let total = drained.len();
        let mut failed = 0usize;
        for (id, resource) in drained {
            if let Err(e) = resource.stop() {
                failed += 1;
                warn!(resource_id = %id, kind = resource.kind(), error = %e, "Failed to stop resource");
            }
        }
        debug!(total, failed, "Stopped all resources");
    }

    /// Close the registry for good and stop everything in it.
    ///
    /// Later registrations fail with `Terminated`, so a facade call that was
    /// already in flight cannot leave a watcher behind.
    pub fn shutdown(&self) {
        self.inner.lock().closed = true;
        self.stop_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Number of live resources.
    pub fn count(&self) -> usize {
        self.inner.lock().entries.len()
    }
}

impl Default for Resources {
    fn default() -> Self {
        Self::new()
    }
}
