//! Reference watchers over the store's change feed.
//!
//! Every watcher subscribes to the feed before it takes its initial snapshot.
//! `next` holds only the watcher's own async mutex while suspended; stop and
//! store closure are observed through watch channels so a suspended `next`
//! (or one queued behind it) resolves as soon as either fires.

use super::model::EntityChange;
use super::State;
use crate::error::ApiError;
use crate::resource::Resource;
use crate::watcher::{AllWatcher, Delta, EntityInfo, NotifyWatcher, StringsWatcher};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, watch, Mutex, MutexGuard};
use tracing::debug;

enum Event {
    Change(EntityChange),
    /// The receiver fell behind and dropped changes.
    Lagged,
}

/// Stop and close signalling shared by every watcher kind.
struct Signals {
    stop: watch::Sender<bool>,
    closed: watch::Receiver<bool>,
}

impl Signals {
    fn new(state: &State) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            stop,
            closed: state.closed_signal(),
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        if *self.stop.borrow() {
            return Err(ApiError::StoppedWatcher);
        }
        if *self.closed.borrow() {
            return Err(ApiError::StoreClosed);
        }
        Ok(())
    }

    /// Resolves once the watcher is stopped or the store closes.
    async fn interrupted(&self) -> ApiError {
        let mut stop = self.stop.subscribe();
        let mut closed = self.closed.clone();
        tokio::select! {
            biased;
            _ = raised(&mut stop) => ApiError::StoppedWatcher,
            _ = raised(&mut closed) => ApiError::StoreClosed,
        }
    }

    async fn lock<'a, T>(&self, inner: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, ApiError> {
        self.check()?;
        let guard = tokio::select! {
            biased;
            err = self.interrupted() => return Err(err),
            guard = inner.lock() => guard,
        };
        self.check()?;
        Ok(guard)
    }

    async fn recv(&self, rx: &mut broadcast::Receiver<EntityChange>) -> Result<Event, ApiError> {
        tokio::select! {
            biased;
            err = self.interrupted() => Err(err),
            res = rx.recv() => match res {
                Ok(change) => Ok(Event::Change(change)),
                Err(RecvError::Lagged(_)) => Ok(Event::Lagged),
                Err(RecvError::Closed) => Err(ApiError::StoreClosed),
            },
        }
    }

    fn stop(&self) {
        self.stop.send_replace(true);
    }
}

/// Wait until a flag is set. A dropped sender counts as set.
async fn raised(flag: &mut watch::Receiver<bool>) {
    loop {
        if *flag.borrow_and_update() {
            return;
        }
        if flag.changed().await.is_err() {
            return;
        }
    }
}

/// Pull every change already queued without waiting.
fn drain_ready(rx: &mut broadcast::Receiver<EntityChange>) -> (Vec<EntityChange>, bool) {
    let mut changes = Vec::new();
    let mut lagged = false;
    loop {
        match rx.try_recv() {
            Ok(change) => changes.push(change),
            Err(TryRecvError::Lagged(_)) => lagged = true,
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
    (changes, lagged)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Machine(String),
    Unit(String),
    Environ,
}

impl Target {
    fn matches(&self, change: &EntityChange) -> bool {
        match (self, change) {
            (Target::Machine(id), EntityChange::Machine(changed)) => id == changed,
            (Target::Unit(name), EntityChange::Unit { name: changed, .. }) => name == changed,
            (Target::Environ, EntityChange::Environ) => true,
            _ => false,
        }
    }
}

struct EntityFeed {
    rx: broadcast::Receiver<EntityChange>,
    /// The initial event has not been delivered yet.
    pending: bool,
}

/// Notifies on any change to one machine, one unit, or the environment
/// settings. The first `next` returns immediately.
pub struct EntityWatcher {
    target: Target,
    signals: Signals,
    feed: Mutex<EntityFeed>,
}

impl EntityWatcher {
    fn new(state: &State, target: Target) -> Self {
        Self {
            target,
            signals: Signals::new(state),
            feed: Mutex::new(EntityFeed {
                rx: state.subscribe(),
                pending: true,
            }),
        }
    }

    pub fn for_machine(state: &State, id: &str) -> Self {
        Self::new(state, Target::Machine(id.to_string()))
    }

    pub fn for_unit(state: &State, name: &str) -> Self {
        Self::new(state, Target::Unit(name.to_string()))
    }

    pub fn for_environ(state: &State) -> Self {
        Self::new(state, Target::Environ)
    }
}

impl Resource for EntityWatcher {
    fn stop(&self) -> Result<(), ApiError> {
        debug!(target_entity = ?self.target, "Stopping entity watcher");
        self.signals.stop();
        Ok(())
    }
}

#[async_trait]
impl NotifyWatcher for EntityWatcher {
    async fn next(&self) -> Result<(), ApiError> {
        let mut feed = self.signals.lock(&self.feed).await?;
        if feed.pending {
            feed.pending = false;
            return Ok(());
        }
        loop {
            match self.signals.recv(&mut feed.rx).await? {
                Event::Lagged => return Ok(()),
                Event::Change(change) if self.target.matches(&change) => {
                    // coalesce anything else already queued
                    drain_ready(&mut feed.rx);
                    return Ok(());
                }
                Event::Change(_) => continue,
            }
        }
    }
}

struct UnitsFeed {
    rx: broadcast::Receiver<EntityChange>,
    initial: Option<Vec<String>>,
}

/// Reports names of units assigned to one machine as they are added, change
/// life, or are removed. The first `next` returns every current unit.
pub struct UnitsWatcher {
    machine_id: String,
    state: Arc<State>,
    signals: Signals,
    feed: Mutex<UnitsFeed>,
}

impl UnitsWatcher {
    pub fn new(state: Arc<State>, machine_id: &str) -> Self {
        let rx = state.subscribe();
        let initial = state.units_for_machine(machine_id);
        Self {
            machine_id: machine_id.to_string(),
            signals: Signals::new(&state),
            feed: Mutex::new(UnitsFeed {
                rx,
                initial: Some(initial),
            }),
            state,
        }
    }

    fn collect(&self, changes: Vec<EntityChange>, names: &mut BTreeSet<String>) {
        for change in changes {
            if let EntityChange::Unit { name, machine_id, .. } = change {
                if machine_id.as_deref() == Some(self.machine_id.as_str()) {
                    names.insert(name);
                }
            }
        }
    }
}

impl Resource for UnitsWatcher {
    fn stop(&self) -> Result<(), ApiError> {
        debug!(machine_id = %self.machine_id, "Stopping units watcher");
        self.signals.stop();
        Ok(())
    }
}

#[async_trait]
impl StringsWatcher for UnitsWatcher {
    async fn next(&self) -> Result<Vec<String>, ApiError> {
        let mut feed = self.signals.lock(&self.feed).await?;
        if let Some(initial) = feed.initial.take() {
            return Ok(initial);
        }
        loop {
            let (mut changes, mut lagged) = match self.signals.recv(&mut feed.rx).await? {
                Event::Change(change) => (vec![change], false),
                Event::Lagged => (Vec::new(), true),
            };
            let (more, more_lagged) = drain_ready(&mut feed.rx);
            changes.extend(more);
            lagged |= more_lagged;

            let mut names = BTreeSet::new();
            if lagged {
                names.extend(self.state.units_for_machine(&self.machine_id));
            }
            self.collect(changes, &mut names);
            if !names.is_empty() {
                return Ok(names.into_iter().collect());
            }
        }
    }
}

type EntityKey = (&'static str, String);

fn key_of(info: &EntityInfo) -> EntityKey {
    let (kind, id) = info.key();
    (kind, id.to_string())
}

struct MultiFeed {
    rx: broadcast::Receiver<EntityChange>,
    /// Last info sent for every entity the client knows about.
    known: HashMap<EntityKey, EntityInfo>,
    started: bool,
}

/// Aggregated delta stream over every machine and unit.
///
/// The first `next` yields the whole model (once it is non-empty); later calls
/// yield one delta per entity whose info changed, and a `removed` delta
/// carrying the final info for entities that disappeared.
pub struct MultiWatcher {
    state: Arc<State>,
    signals: Signals,
    feed: Mutex<MultiFeed>,
}

impl MultiWatcher {
    pub fn new(state: Arc<State>) -> Self {
        Self {
            signals: Signals::new(&state),
            feed: Mutex::new(MultiFeed {
                rx: state.subscribe(),
                known: HashMap::new(),
                started: false,
            }),
            state,
        }
    }

    fn current(&self, key: &EntityKey) -> Option<EntityInfo> {
        match key.0 {
            "machine" => self.state.machine_info(&key.1),
            _ => self.state.unit_info(&key.1),
        }
    }

    /// Deltas for `keys`. An entity gone from the store is reported once,
    /// with its final info from `finals` when the removal published one.
    fn deltas_for(
        &self,
        known: &mut HashMap<EntityKey, EntityInfo>,
        keys: Vec<EntityKey>,
        finals: &mut HashMap<EntityKey, EntityInfo>,
    ) -> Vec<Delta> {
        let mut deltas = Vec::new();
        for key in keys {
            match self.current(&key) {
                Some(info) => {
                    if known.get(&key) != Some(&info) {
                        known.insert(key, info.clone());
                        deltas.push(Delta {
                            removed: false,
                            entity: info,
                        });
                    }
                }
                None => {
                    if let Some(last) = known.remove(&key) {
                        deltas.push(Delta {
                            removed: true,
                            entity: finals.remove(&key).unwrap_or(last),
                        });
                    }
                }
            }
        }
        deltas
    }
}

impl Resource for MultiWatcher {
    fn stop(&self) -> Result<(), ApiError> {
        debug!("Stopping multiwatcher");
        self.signals.stop();
        Ok(())
    }
}

#[async_trait]
impl AllWatcher for MultiWatcher {
    async fn next(&self) -> Result<Vec<Delta>, ApiError> {
        let mut feed = self.signals.lock(&self.feed).await?;
        let feed = &mut *feed;
        if !feed.started {
            feed.started = true;
            let keys = self.state.all_infos().iter().map(key_of).collect();
            let deltas = self.deltas_for(&mut feed.known, keys, &mut HashMap::new());
            if !deltas.is_empty() {
                return Ok(deltas);
            }
        }
        loop {
            let (mut changes, mut lagged) = match self.signals.recv(&mut feed.rx).await? {
                Event::Change(change) => (vec![change], false),
                Event::Lagged => (Vec::new(), true),
            };
            let (more, more_lagged) = drain_ready(&mut feed.rx);
            changes.extend(more);
            lagged |= more_lagged;

            let mut keys: Vec<EntityKey> = Vec::new();
            let mut finals: HashMap<EntityKey, EntityInfo> = HashMap::new();
            if lagged {
                keys.extend(feed.known.keys().cloned());
                keys.extend(self.state.all_infos().iter().map(key_of));
            }
            for change in changes {
                match change {
                    EntityChange::Machine(id) => keys.push(("machine", id)),
                    EntityChange::Unit { name, removed, .. } => {
                        if let Some(last) = removed {
                            finals.insert(("unit", name.clone()), EntityInfo::Unit(last));
                        }
                        keys.push(("unit", name));
                    }
                    EntityChange::Environ => {}
                }
            }
            let mut seen = std::collections::HashSet::new();
            keys.retain(|k| seen.insert(k.clone()));

            let deltas = self.deltas_for(&mut feed.known, keys, &mut finals);
            if !deltas.is_empty() {
                return Ok(deltas);
            }
        }
    }
}
