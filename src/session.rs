//! Live preview sessions.
//!
//! One session per source file. A session owns a [`Subscription`] on the
//! [`WatchHub`] and a handler task that re-renders into the session's
//! stable [`DocUri`] whenever the source or one of its imports is saved.
//!
//! ```text
//! WatchHub ──SaveEvent──▶ queue ──▶ handler task
//!                                     │ filter (source or dependency)
//!                                     │ coalesce queued saves
//!                                     │ rescan imports, re-watch
//!                                     │ render
//!                                     ▼
//!                         Registry::set + Host::document_changed
//! ```
//!
//! Saves are handled one at a time per session. A render that finishes
//! while a newer save is already queued is dropped and the next iteration
//! renders again, so the document never regresses to older content.
//!
//! Sessions end only through [`LivePreview::close`].

use crate::{
    deps::{DepSet, collect_dependencies},
    error::Result,
    host::Host,
    log,
    registry::{DocUri, Registry},
    render::Renderer,
    watch::{Interest, SaveEvent, Subscription, WatchHub},
};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use std::{
    collections::hash_map::Entry,
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::mpsc::UnboundedReceiver;

struct LiveSession {
    uri: DocUri,
    subscription: Subscription,
    deps: Arc<RwLock<DepSet>>,
}

/// Table of active live sessions, keyed by absolute source path.
pub struct LivePreview {
    registry: Arc<Registry>,
    host: Arc<dyn Host>,
    renderer: Arc<Renderer>,
    hub: Arc<WatchHub>,
    sessions: Mutex<FxHashMap<PathBuf, LiveSession>>,
}

impl LivePreview {
    pub fn new(
        registry: Arc<Registry>,
        host: Arc<dyn Host>,
        renderer: Arc<Renderer>,
        hub: Arc<WatchHub>,
    ) -> Self {
        Self {
            registry,
            host,
            renderer,
            hub,
            sessions: Mutex::new(FxHashMap::default()),
        }
    }

    /// Start (or refresh) live preview of `source` and present it.
    ///
    /// A second call for an active source renders into the same document
    /// again instead of starting another session. If the first render
    /// fails the session stays registered, so fixing the file and saving
    /// recovers.
    pub async fn open(&self, source: &Path) -> Result<DocUri> {
        let uri = match self.uri_of(source) {
            Some(uri) => uri,
            None => self.start(source).await,
        };

        let text = self.renderer.render(source).await?;
        self.registry.set(&uri, text);
        self.host.show_document(&uri);
        Ok(uri)
    }

    async fn start(&self, source: &Path) -> DocUri {
        let uri = DocUri::live(source);
        let deps = collect_dependencies(source).await;

        let (subscription, rx) = self.hub.subscribe();
        subscription.watch(&deps);
        let deps = Arc::new(RwLock::new(deps));

        let mut sessions = self.sessions.lock();
        // another `open` for the same source may have finished while we scanned
        let Entry::Vacant(slot) = sessions.entry(source.to_path_buf()) else {
            subscription.dispose();
            return uri;
        };

        let handler = Handler {
            source: source.to_path_buf(),
            uri: uri.clone(),
            deps: Arc::clone(&deps),
            interest: subscription.interest(),
            registry: Arc::clone(&self.registry),
            host: Arc::clone(&self.host),
            renderer: Arc::clone(&self.renderer),
        };
        tokio::spawn(handler.run(rx));

        log!("live"; "watching {} ({} files)", source.display(), deps.read().len());
        slot.insert(LiveSession {
            uri: uri.clone(),
            subscription,
            deps,
        });
        uri
    }

    /// Tear down the session presenting `uri`, if any.
    ///
    /// Releases its watches and stops further renders. A render already in
    /// flight runs to completion but is not published.
    pub fn close(&self, uri: &DocUri) -> bool {
        let mut sessions = self.sessions.lock();
        let Some(source) = sessions
            .iter()
            .find(|(_, session)| &session.uri == uri)
            .map(|(source, _)| source.clone())
        else {
            return false;
        };
        let Some(session) = sessions.remove(&source) else {
            return false;
        };
        drop(sessions);

        session.subscription.dispose();
        log!("live"; "stopped watching {}", source.display());
        true
    }

    /// Live document of `source`, when a session is active.
    pub fn uri_of(&self, source: &Path) -> Option<DocUri> {
        self.sessions.lock().get(source).map(|session| session.uri.clone())
    }

    /// Current dependency set of the session for `source`.
    #[cfg(test)]
    pub fn dependencies(&self, source: &Path) -> Option<DepSet> {
        self.sessions
            .lock()
            .get(source)
            .map(|session| session.deps.read().clone())
    }

    /// Documents of every active session, sorted.
    pub fn uris(&self) -> Vec<DocUri> {
        let mut uris: Vec<_> = self
            .sessions
            .lock()
            .values()
            .map(|session| session.uri.clone())
            .collect();
        uris.sort();
        uris
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

// =============================================================================
// Handler Task
// =============================================================================

struct Handler {
    source: PathBuf,
    uri: DocUri,
    deps: Arc<RwLock<DepSet>>,
    interest: Interest,
    registry: Arc<Registry>,
    host: Arc<dyn Host>,
    renderer: Arc<Renderer>,
}

impl Handler {
    fn is_trigger(&self, event: &SaveEvent) -> bool {
        event.path == self.source || self.deps.read().contains(&event.path)
    }

    async fn run(self, mut rx: UnboundedReceiver<SaveEvent>) {
        let mut stale = false;

        loop {
            if !stale {
                let Some(event) = rx.recv().await else { break };
                if !self.is_trigger(&event) {
                    continue;
                }
            }
            stale = false;

            // everything queued so far is covered by the render below
            while rx.try_recv().is_ok() {}
            if rx.is_closed() {
                break;
            }

            let deps = collect_dependencies(&self.source).await;
            self.interest.watch(&deps);
            *self.deps.write() = deps;

            let result = self.renderer.render(&self.source).await;
            if rx.is_closed() {
                break;
            }
            // a save that arrived mid-render makes this result outdated
            let mut superseded = false;
            while let Ok(event) = rx.try_recv() {
                superseded |= self.is_trigger(&event);
            }
            if superseded {
                stale = true;
                continue;
            }

            match result {
                Ok(text) => {
                    self.registry.set(&self.uri, text);
                    self.host.document_changed(&self.uri);
                }
                Err(e) => self.host.warning(&format!("Render failed: {e}")),
            }
        }
    }
}
