//! Transitive import discovery for live preview.
//!
//! A purely textual scan: every `import "x"`, `importstr 'x'` and
//! `importbin "x"` (parenthesized or not) is resolved against the importing
//! file's directory and scanned in turn. Computed or conditional imports are
//! not understood.
//!
//! The result always contains the root file itself, and each reachable file
//! exactly once, even when imports form a cycle.

use crate::utils::path::normalize_lexically;
use regex::Regex;
use rustc_hash::FxHashSet;
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
};

/// Set of absolute paths a source file depends on, including itself.
pub type DepSet = FxHashSet<PathBuf>;

fn import_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\bimport(?:str|bin)?\s*(?:\(\s*)?["']([^"']+)["']\s*\)?"#)
            .unwrap_or_else(|e| unreachable!("import pattern is a valid regex: {e}"))
    })
}

/// Extract the raw import targets written in `content`, in source order.
pub fn scan_imports(content: &str) -> Vec<&str> {
    import_pattern()
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .collect()
}

/// Collect `root` and every file it transitively imports.
///
/// Unreadable files (missing, permission denied) are members of the set but
/// contribute no further dependencies.
pub async fn collect_dependencies(root: &Path) -> DepSet {
    let mut seen = DepSet::default();
    let mut stack = vec![normalize_lexically(root)];

    while let Some(path) = stack.pop() {
        if !seen.insert(path.clone()) {
            continue;
        }

        let Ok(content) = tokio::fs::read_to_string(&path).await else {
            continue;
        };

        let dir = path.parent().unwrap_or(Path::new("/"));
        for target in scan_imports(&content) {
            let dep = normalize_lexically(&dir.join(target));
            if !seen.contains(&dep) {
                stack.push(dep);
            }
        }
    }

    seen
}
