//! File-save notifications for live preview.
//!
//! A [`WatchHub`] owns one `notify` watcher for the whole process. Raw
//! file-system events are batched by a [`Debouncer`] (editors emit several
//! events per save) and each changed path is broadcast as a [`SaveEvent`]
//! to every subscriber's queue. Subscribers filter for the paths they care
//! about.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────┐   ┌───────────────┐   ┌──────────────┐
//! │ notify   │──▶│ Debouncer │──▶│ WatchHub      │──▶│ session queue│ ...
//! │ callback │   │ (quiet    │   │ ::dispatch()  │   └──────────────┘
//! └──────────┘   │  window)  │   └───────────────┘
//!                └───────────┘
//! ```
//!
//! Directories are watched non-recursively and reference-counted across
//! subscriptions, so two sessions importing the same library share one
//! watch and disposing one leaves the other intact.

use crate::{deps::DepSet, log, utils::path::is_temp_file};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Weak},
    time::{Duration, Instant},
};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Idle wait between events when nothing is pending.
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// A file was written (saved, created or replaced).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveEvent {
    pub path: PathBuf,
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events until a quiet window has passed.
struct Debouncer {
    window: Duration,
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event) {
        for path in event.paths {
            if !is_temp_file(&path) {
                self.pending.insert(path);
            }
        }
        self.last_event = Some(Instant::now());
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty() && self.last_event.is_some_and(|t| t.elapsed() >= self.window)
    }

    /// Drain pending paths in a stable order.
    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            IDLE_TIMEOUT
        } else {
            self.window
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}

// =============================================================================
// Hub
// =============================================================================

struct Subscriber {
    tx: UnboundedSender<SaveEvent>,
    dirs: FxHashSet<PathBuf>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    subscribers: FxHashMap<u64, Subscriber>,
    /// Directory → number of subscriptions interested in it.
    watched: FxHashMap<PathBuf, usize>,
    /// Directories with a live watch on the backend. A wanted directory
    /// that does not exist yet is missing here until it appears.
    active: FxHashSet<PathBuf>,
}

/// Process-wide source of [`SaveEvent`]s.
pub struct WatchHub {
    state: Mutex<HubState>,
    watcher: Option<Mutex<RecommendedWatcher>>,
}

impl WatchHub {
    /// Hub without a file-system backend. Events arrive only through
    /// [`WatchHub::dispatch`].
    pub fn detached() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            watcher: None,
        })
    }

    /// Hub backed by the platform's recommended watcher, with events
    /// coalesced over `debounce`. Must be called inside a tokio runtime.
    pub fn spawn(debounce: Duration) -> notify::Result<Arc<Self>> {
        let (tx, rx) = mpsc::unbounded_channel();
        let watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;

        let hub = Arc::new(Self {
            state: Mutex::new(HubState::default()),
            watcher: Some(Mutex::new(watcher)),
        });
        tokio::spawn(run_events(Arc::downgrade(&hub), rx, debounce));
        Ok(hub)
    }

    /// Register a new subscriber and return its handle and event queue.
    pub fn subscribe(self: &Arc<Self>) -> (Subscription, UnboundedReceiver<SaveEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.subscribers.insert(
            id,
            Subscriber {
                tx,
                dirs: FxHashSet::default(),
            },
        );
        let subscription = Subscription {
            id,
            hub: Arc::clone(self),
        };
        (subscription, rx)
    }

    /// Broadcast a save of `path` to every subscriber.
    pub fn dispatch(&self, path: &Path) {
        let mut state = self.state.lock();
        state.subscribers.retain(|_, sub| {
            sub.tx
                .send(SaveEvent {
                    path: path.to_path_buf(),
                })
                .is_ok()
        });
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    /// Directories some subscription wants watched, sorted.
    #[cfg(test)]
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.state.lock().watched.keys().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Directories the backend is actually watching, sorted.
    #[cfg(test)]
    fn active_dirs(&self) -> Vec<PathBuf> {
        let mut dirs: Vec<_> = self.state.lock().active.iter().cloned().collect();
        dirs.sort();
        dirs
    }

    /// Replace the directories subscription `id` needs watched.
    fn set_interest(&self, id: u64, deps: &DepSet) {
        let wanted: FxHashSet<PathBuf> = deps
            .iter()
            .filter_map(|p| p.parent())
            .map(Path::to_path_buf)
            .collect();

        let mut state = self.state.lock();
        let Some(sub) = state.subscribers.get_mut(&id) else {
            return;
        };
        let old = std::mem::replace(&mut sub.dirs, wanted.clone());

        for dir in wanted.difference(&old) {
            *state.watched.entry(dir.clone()).or_insert(0) += 1;
        }
        for dir in old.difference(&wanted) {
            self.release(&mut state, dir);
        }
        self.activate_pending(&mut state);
    }

    fn unsubscribe(&self, id: u64) {
        let mut state = self.state.lock();
        if let Some(sub) = state.subscribers.remove(&id) {
            for dir in &sub.dirs {
                self.release(&mut state, dir);
            }
        }
    }

    /// Start backend watches for wanted directories that exist by now.
    fn activate_pending(&self, state: &mut HubState) {
        let Some(watcher) = &self.watcher else {
            return;
        };
        let pending: Vec<PathBuf> = state
            .watched
            .keys()
            .filter(|dir| !state.active.contains(*dir) && dir.is_dir())
            .cloned()
            .collect();

        let mut watcher = watcher.lock();
        for dir in pending {
            match watcher.watch(&dir, RecursiveMode::NonRecursive) {
                Ok(()) => {
                    state.active.insert(dir);
                }
                Err(e) => log!("watch"; "failed to watch {}: {e}", dir.display()),
            }
        }
    }

    fn release(&self, state: &mut HubState, dir: &Path) {
        let Some(count) = state.watched.get_mut(dir) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }
        state.watched.remove(dir);
        if state.active.remove(dir)
            && let Some(watcher) = &self.watcher
        {
            // The directory may already be gone; nothing left to release then.
            let _ = watcher.lock().unwatch(dir);
        }
    }
}

/// Event loop: debounce raw notify events and dispatch them as saves.
async fn run_events(
    hub: Weak<WatchHub>,
    mut rx: UnboundedReceiver<notify::Result<Event>>,
    debounce: Duration,
) {
    let mut debouncer = Debouncer::new(debounce);

    loop {
        match tokio::time::timeout(debouncer.timeout(), rx.recv()).await {
            Ok(Some(Ok(event))) if is_relevant(&event) => debouncer.add(event),
            Ok(Some(Err(e))) => log!("watch"; "error: {e}"),
            Ok(None) => break,
            // Irrelevant events and quiet-window timeouts
            _ => {}
        }

        if debouncer.ready() {
            let Some(hub) = hub.upgrade() else {
                break;
            };
            for path in debouncer.take() {
                hub.dispatch(&path);
            }
        }
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// A live registration with the [`WatchHub`].
///
/// Released by [`Subscription::dispose`]; since `dispose` consumes the
/// handle it can run at most once. Dropping the handle releases it too.
pub struct Subscription {
    id: u64,
    hub: Arc<WatchHub>,
}

impl Subscription {
    /// Watch the directories containing every path in `deps`, replacing
    /// the previous interest.
    pub fn watch(&self, deps: &DepSet) {
        self.hub.set_interest(self.id, deps);
    }

    /// Handle for updating this subscription's watched paths from the task
    /// that consumes its events. It cannot dispose the subscription.
    pub fn interest(&self) -> Interest {
        Interest {
            id: self.id,
            hub: Arc::clone(&self.hub),
        }
    }

    /// Stop delivering events and release watched directories.
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unsubscribe(self.id);
    }
}

/// Non-owning view of a [`Subscription`]'s watched paths.
///
/// Updates are ignored once the subscription has been disposed.
#[derive(Clone)]
pub struct Interest {
    id: u64,
    hub: Arc<WatchHub>,
}

impl Interest {
    pub fn watch(&self, deps: &DepSet) {
        self.hub.set_interest(self.id, deps);
    }
}
