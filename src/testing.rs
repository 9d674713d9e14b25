//! Test fixtures: fake evaluator/converter tools and a recording host.
//!
//! The fake evaluator prints its last argument's contents, so a "source
//! file" holds the JSON it evaluates to. The fake converter turns a one-key object `{"a":1}` into
//! `a: 1` and passes anything else through unchanged.

use crate::{
    config::RenderConfig,
    host::Host,
    registry::{DocUri, Registry},
};
use parking_lot::Mutex;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Config whose tools are `sh`/`sed` stand-ins.
pub fn fake_config(root: &Path) -> RenderConfig {
    let mut config = RenderConfig::default();
    config.tools.evaluator = "sh".into();
    config.tools.evaluator_args = vec![
        "-c".into(),
        r#"for f; do :; done; cat "$f""#.into(),
        "sh".into(),
    ];
    config.tools.converter = "sed".into();
    config.tools.converter_args = vec!["-e".into(), r#"s/^{"\([^"]*\)":\(.*\)}$/\1: \2/"#.into()];
    config.set_root(root);
    config.live.debounce_ms = 20;
    config
}

/// Config whose evaluator always fails with `message` on stderr.
pub fn failing_config(root: &Path, message: &str) -> RenderConfig {
    let mut config = fake_config(root);
    config.tools.evaluator_args = vec!["-c".into(), format!("echo '{message}' >&2; exit 1"), "sh".into()];
    config
}

pub fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Everything a host was asked to do, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Shown(DocUri, String),
    Diff(DocUri, DocUri, String),
    Changed(DocUri, String),
    Error(String),
    Warning(String),
}

/// Host that records requests, snapshotting document content at call time.
pub struct RecordingHost {
    registry: Arc<Registry>,
    events: Mutex<Vec<HostEvent>>,
}

impl RecordingHost {
    pub fn new(registry: Arc<Registry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().clone()
    }

    pub fn changes(&self) -> Vec<(DocUri, String)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Changed(uri, text) => Some((uri, text)),
                _ => None,
            })
            .collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::Warning(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }
}

impl Host for RecordingHost {
    fn show_document(&self, uri: &DocUri) {
        let text = self.registry.provide(uri);
        self.events.lock().push(HostEvent::Shown(uri.clone(), text));
    }

    fn show_diff(&self, original: &DocUri, current: &DocUri, title: &str) {
        self.events
            .lock()
            .push(HostEvent::Diff(original.clone(), current.clone(), title.to_owned()));
    }

    fn document_changed(&self, uri: &DocUri) {
        let text = self.registry.provide(uri);
        self.events.lock().push(HostEvent::Changed(uri.clone(), text));
    }

    fn error(&self, message: &str) {
        self.events.lock().push(HostEvent::Error(message.to_owned()));
    }

    fn warning(&self, message: &str) {
        self.events.lock().push(HostEvent::Warning(message.to_owned()));
    }
}
