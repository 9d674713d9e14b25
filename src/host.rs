//! Presentation boundary.
//!
//! The core never prints documents itself: it fills the [`Registry`] and
//! asks a [`Host`] to present what it wrote. The host reads content back
//! through [`Registry::provide`] only.
//!
//! [`TerminalHost`] is the CLI host. Without an output directory documents
//! go to stdout; with one, each document is a file named after its URI so
//! an editor can keep it open while live preview rewrites it.

use crate::{
    log,
    logger::WatchStatus,
    registry::{DocUri, Registry},
};
use colored::Colorize;
use parking_lot::Mutex;
use similar::{ChangeTag, TextDiff};
use std::{
    fs,
    io::{Write, stdout},
    path::PathBuf,
    sync::Arc,
};

/// Operations the core requests from whatever presents documents.
pub trait Host: Send + Sync {
    /// Open a document for viewing.
    fn show_document(&self, uri: &DocUri);

    /// Present two documents side by side.
    fn show_diff(&self, original: &DocUri, current: &DocUri, title: &str);

    /// Content behind an already-open document was replaced.
    fn document_changed(&self, uri: &DocUri);

    /// The single user-visible failure of an operation.
    fn error(&self, message: &str);

    /// A transient, non-fatal problem (live preview keeps running).
    fn warning(&self, message: &str);
}

/// CLI host printing to the terminal or writing into an output directory.
pub struct TerminalHost {
    registry: Arc<Registry>,
    output: Option<PathBuf>,
    status: Mutex<WatchStatus>,
}

impl TerminalHost {
    pub fn new(registry: Arc<Registry>, output: Option<PathBuf>) -> Self {
        Self {
            registry,
            output,
            status: Mutex::new(WatchStatus::new()),
        }
    }

    /// Write `uri` into the output directory, returning the file path.
    fn write_file(&self, uri: &DocUri) -> Option<PathBuf> {
        let dir = self.output.as_ref()?;
        let path = dir.join(uri.name());
        let result = fs::create_dir_all(dir).and_then(|()| fs::write(&path, self.registry.provide(uri)));
        match result {
            Ok(()) => Some(path),
            Err(e) => {
                log!("error"; "failed to write `{}`: {e}", path.display());
                None
            }
        }
    }

    fn print(&self, uri: &DocUri) {
        let mut out = stdout().lock();
        writeln!(out, "{}", self.registry.provide(uri)).ok();
        out.flush().ok();
    }
}

impl Host for TerminalHost {
    fn show_document(&self, uri: &DocUri) {
        if self.output.is_some() {
            if let Some(path) = self.write_file(uri) {
                log!("render"; "{}", path.display());
            }
        } else {
            self.print(uri);
        }
    }

    fn show_diff(&self, original: &DocUri, current: &DocUri, title: &str) {
        if self.output.is_some() {
            for uri in [original, current] {
                if let Some(path) = self.write_file(uri) {
                    log!("compare"; "{}", path.display());
                }
            }
        }

        let before = self.registry.provide(original);
        let after = self.registry.provide(current);
        let mut out = stdout().lock();
        writeln!(out, "{}", title.bold()).ok();
        write!(out, "{}", unified_diff(&before, &after, original.name(), current.name())).ok();
        out.flush().ok();
    }

    fn document_changed(&self, uri: &DocUri) {
        if self.output.is_some() {
            if self.write_file(uri).is_some() {
                self.status.lock().success(&format!("{} updated", uri.name()));
            }
        } else {
            self.print(uri);
            // stdout moved the cursor; the next status must not overwrite it
            let mut status = self.status.lock();
            *status = WatchStatus::new();
            status.success(&format!("{} updated", uri.name()));
        }
    }

    fn error(&self, message: &str) {
        log!("error"; "{message}");
    }

    fn warning(&self, message: &str) {
        let (summary, detail) = message.split_once('\n').unwrap_or((message, ""));
        self.status.lock().error(summary, detail);
    }
}

/// Colored unified diff between two rendered texts.
///
/// Identical inputs produce `no changes`.
pub fn unified_diff(before: &str, after: &str, before_name: &str, after_name: &str) -> String {
    if before == after {
        return format!("{}\n", "no changes".dimmed());
    }

    let diff = TextDiff::from_lines(before, after);
    let mut text = format!(
        "{}\n{}\n",
        format!("--- {before_name}").red(),
        format!("+++ {after_name}").green()
    );

    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        text.push_str(&format!("{}\n", hunk.header().to_string().cyan()));
        for change in hunk.iter_changes() {
            let value = change.value().trim_end_matches('\n');
            let line = match change.tag() {
                ChangeTag::Delete => format!("-{value}").red().to_string(),
                ChangeTag::Insert => format!("+{value}").green().to_string(),
                ChangeTag::Equal => format!(" {value}"),
            };
            text.push_str(&line);
            text.push('\n');
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unified_diff_identical() {
        colored::control::set_override(false);
        assert_eq!(unified_diff("a: 1", "a: 1", "o", "c"), "no changes\n");
    }

    #[test]
    fn test_unified_diff_marks_changes() {
        colored::control::set_override(false);
        let diff = unified_diff("a: 1\nb: 2\n", "a: 1\nb: 3\n", "original.yaml", "current.yaml");
        assert!(diff.starts_with("--- original.yaml\n+++ current.yaml\n"));
        assert!(diff.contains("@@"));
        assert!(diff.contains("\n a: 1\n"));
        assert!(diff.contains("\n-b: 2\n"));
        assert!(diff.contains("\n+b: 3\n"));
    }

    #[test]
    fn test_terminal_host_writes_output_dir() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(Registry::new());
        let host = TerminalHost::new(Arc::clone(&registry), Some(dir.path().join("out")));

        let uri = DocUri::live(std::path::Path::new("/p/app.jsonnet"));
        registry.set(&uri, "a: 1".into());
        host.show_document(&uri);
        let file = dir.path().join("out").join(uri.name());
        assert_eq!(fs::read_to_string(&file).unwrap(), "a: 1");

        registry.set(&uri, "a: 2".into());
        host.document_changed(&uri);
        assert_eq!(fs::read_to_string(&file).unwrap(), "a: 2");
    }
}
