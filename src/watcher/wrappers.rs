//! Per-connection watcher wrappers.
//!
//! A wrapper pairs a watcher with the id it is registered under. The registry
//! still tracks the watcher, so `stop` goes through the registry: the id is
//! deregistered and any `next` suspended on the watcher resolves with an
//! end-of-stream error.

use super::contract::{AllWatcher, Delta, NotifyWatcher, StringsWatcher};
use crate::error::ApiError;
use crate::resource::Resources;
use crate::types::ResourceId;
use std::sync::Arc;

/// API access to a [`NotifyWatcher`].
pub struct NotifyWatcherApi {
    watcher: Arc<dyn NotifyWatcher>,
    id: ResourceId,
    resources: Arc<Resources>,
}

impl NotifyWatcherApi {
    pub(crate) fn new(
        watcher: Arc<dyn NotifyWatcher>,
        id: ResourceId,
        resources: Arc<Resources>,
    ) -> Self {
        Self {
            watcher,
            id,
            resources,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next change.
    pub async fn next(&self) -> Result<(), ApiError> {
        self.watcher.next().await
    }

    /// Stop the watcher and deregister it.
    pub fn stop(&self) -> Result<(), ApiError> {
        self.resources.stop(&self.id)
    }
}

/// API access to a [`StringsWatcher`].
pub struct StringsWatcherApi {
    watcher: Arc<dyn StringsWatcher>,
    id: ResourceId,
    resources: Arc<Resources>,
}

impl StringsWatcherApi {
    pub(crate) fn new(
        watcher: Arc<dyn StringsWatcher>,
        id: ResourceId,
        resources: Arc<Resources>,
    ) -> Self {
        Self {
            watcher,
            id,
            resources,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next batch of changed ids.
    pub async fn next(&self) -> Result<Vec<String>, ApiError> {
        self.watcher.next().await
    }

    pub fn stop(&self) -> Result<(), ApiError> {
        self.resources.stop(&self.id)
    }
}

/// API access to an [`AllWatcher`].
pub struct AllWatcherApi {
    watcher: Arc<dyn AllWatcher>,
    id: ResourceId,
    resources: Arc<Resources>,
}

impl AllWatcherApi {
    pub(crate) fn new(
        watcher: Arc<dyn AllWatcher>,
        id: ResourceId,
        resources: Arc<Resources>,
    ) -> Self {
        Self {
            watcher,
            id,
            resources,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the next set of deltas.
    pub async fn next(&self) -> Result<Vec<Delta>, ApiError> {
        self.watcher.next().await
    }

    pub fn stop(&self) -> Result<(), ApiError> {
        self.resources.stop(&self.id)
    }
}
