//! In-memory store of rendered documents, addressed by synthetic URIs.
//!
//! The host reads through [`Registry::provide`], which never fails: a
//! document that has not been populated yet (or was already evicted) reads
//! as empty text. Writes come from the render, compare and live preview
//! paths. Eviction happens when the host closes a document.

use crate::utils::path::base_name;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::{fmt, path::Path};

/// URI scheme of every rendered document.
pub const SCHEME: &str = "rendered";

/// Synthetic identifier of a rendered document: `rendered:<name>`.
///
/// One-shot renders and comparisons are timestamped and therefore unique
/// per invocation; live identifiers derive from the source path only, so
/// they stay stable for the life of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocUri(String);

impl DocUri {
    /// `rendered:rendered_<ts>_<base>.yaml`
    pub fn rendered(timestamp: &str, source: &Path) -> Self {
        Self::named(format!("rendered_{timestamp}_{}.yaml", base_name(source)))
    }

    /// `rendered:original_<ts>_<base>.yaml` (the HEAD side of a comparison)
    pub fn original(timestamp: &str, source: &Path) -> Self {
        Self::named(format!("original_{timestamp}_{}.yaml", base_name(source)))
    }

    /// `rendered:current_<ts>_<base>.yaml` (the working-tree side)
    pub fn current(timestamp: &str, source: &Path) -> Self {
        Self::named(format!("current_{timestamp}_{}.yaml", base_name(source)))
    }

    /// `rendered:live_<sanitized path>.yaml`, stable for a given source path.
    pub fn live(source: &Path) -> Self {
        let sanitized: String = source
            .to_string_lossy()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        Self::named(format!("live_{sanitized}.yaml"))
    }

    /// Parse a `rendered:` URI. Any other scheme is not ours.
    pub fn parse(uri: &str) -> Option<Self> {
        uri.strip_prefix(SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .filter(|name| !name.is_empty())
            .map(|name| Self::named(name.to_owned()))
    }

    fn named(name: String) -> Self {
        Self(format!("{SCHEME}:{name}"))
    }

    /// Document name without the scheme, usable as a file name.
    pub fn name(&self) -> &str {
        &self.0[SCHEME.len() + 1..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Local time as `YYYY-MM-DD_HHMMSS`, used in one-shot document names.
pub fn local_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d_%H%M%S").to_string()
}

/// Rendered text by document URI.
#[derive(Debug, Default)]
pub struct Registry {
    docs: RwLock<FxHashMap<DocUri, String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content for `uri`, or empty text when there is none.
    pub fn provide(&self, uri: &DocUri) -> String {
        self.docs.read().get(uri).cloned().unwrap_or_default()
    }

    /// Insert or replace the content of `uri`.
    pub fn set(&self, uri: &DocUri, content: String) {
        self.docs.write().insert(uri.clone(), content);
    }

    /// Evict `uri`, returning its content if it was present.
    pub fn remove(&self, uri: &DocUri) -> Option<String> {
        self.docs.write().remove(uri)
    }

    #[cfg(test)]
    pub fn contains(&self, uri: &DocUri) -> bool {
        self.docs.read().contains_key(uri)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Every URI currently held, sorted.
    #[cfg(test)]
    pub fn uris(&self) -> Vec<DocUri> {
        let mut uris: Vec<_> = self.docs.read().keys().cloned().collect();
        uris.sort();
        uris
    }
}
