//! Path helpers for source files and their imports.

use std::{
    env,
    path::{Component, Path, PathBuf},
};

/// Collapse `.` and `..` components without touching the file system.
///
/// `/proj/env/../lib/./base.libsonnet` → `/proj/lib/base.libsonnet`
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Absolute form of `path`: canonical when it exists, otherwise joined onto
/// the current directory and normalized.
pub fn absolutize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            normalize_lexically(path)
        } else {
            env::current_dir().map_or_else(
                |_| path.to_path_buf(),
                |cwd| normalize_lexically(&cwd.join(path)),
            )
        }
    })
}

/// File stem used in document names: `env/prod.jsonnet` → `prod`.
pub fn base_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Check if path is a temp/backup file (editor artifacts).
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
}
