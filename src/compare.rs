//! Compare a file's rendering at `HEAD` against the working tree.
//!
//! `HEAD` is materialized as a detached git worktree in a fresh temporary
//! directory, used for exactly one render and then removed:
//!
//! ```text
//! 1. <tmp>/jsonnet-head-<millis>-<rand>       unique checkout path
//! 2. git worktree add --detach <dir> HEAD
//! 3. <dir>/<path relative to repo root>      same file at HEAD
//! 4. render original, then render current
//! 5. git worktree remove --force <dir>       always, even after a failure
//!    rm -rf <dir>
//! 6. Registry::set ×2, Host::show_diff
//! ```
//!
//! Cleanup problems are logged and never replace the comparison's result.

use crate::{
    config::RenderConfig,
    error::{RenderError, Result},
    exec,
    host::Host,
    log,
    registry::{DocUri, Registry, local_timestamp},
    render::Renderer,
    utils::path::{absolutize, base_name},
};
use rand::Rng;
use std::{
    env,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

/// Prefix of every checkout directory under the system temp dir.
pub const CHECKOUT_PREFIX: &str = "jsonnet-head-";

/// Both sides of a finished comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub original: DocUri,
    pub current: DocUri,
    pub title: String,
}

pub struct VersionCompare {
    git: String,
    root: PathBuf,
    /// Parent of checkout directories.
    temp_root: PathBuf,
    registry: Arc<Registry>,
    host: Arc<dyn Host>,
    renderer: Arc<Renderer>,
}

impl VersionCompare {
    pub fn new(
        config: &RenderConfig,
        registry: Arc<Registry>,
        host: Arc<dyn Host>,
        renderer: Arc<Renderer>,
    ) -> Self {
        Self {
            git: config.tools.git.clone(),
            root: config.root.clone(),
            temp_root: env::temp_dir(),
            registry,
            host,
            renderer,
        }
    }

    /// Render `file` at `HEAD` and in the working tree and present the diff.
    pub async fn compare(&self, file: &Path) -> Result<Comparison> {
        let file = absolutize(file);
        if !file.starts_with(&self.root) {
            return Err(RenderError::invalid("File must be inside a workspace folder."));
        }

        let repo = self.repo_root().await?;
        let relative = file
            .strip_prefix(&repo)
            .map_err(|_| RenderError::invalid("File must be inside the git repository."))?
            .to_path_buf();

        let checkout = checkout_dir(&self.temp_root);
        let rendered = self.render_both(&repo, &checkout, &relative, &file).await;
        self.remove_checkout(&repo, &checkout).await;
        let (original_text, current_text) = rendered?;

        let ts = local_timestamp();
        let original = DocUri::original(&ts, &file);
        let current = DocUri::current(&ts, &file);
        self.registry.set(&original, original_text);
        self.registry.set(&current, current_text);

        let title = format!("Diff: original ↔ current ({})", base_name(&file));
        self.host.show_diff(&original, &current, &title);
        Ok(Comparison {
            original,
            current,
            title,
        })
    }

    async fn repo_root(&self) -> Result<PathBuf> {
        let top = exec!(self.root.as_path(); [self.git.as_str()]; "rev-parse", "--show-toplevel").await?;
        Ok(absolutize(Path::new(&top)))
    }

    /// Steps 2 to 4. The checkout may exist (fully or partly) on return.
    async fn render_both(
        &self,
        repo: &Path,
        checkout: &Path,
        relative: &Path,
        file: &Path,
    ) -> Result<(String, String)> {
        exec!(repo; [self.git.as_str()]; "worktree", "add", "--detach", checkout, "HEAD").await?;

        // libraries inside the repository are read from HEAD as well
        let head = self.renderer.rebased(repo, checkout);
        let original = head.render(&checkout.join(relative)).await?;
        let current = self.renderer.render(file).await?;
        Ok((original, current))
    }

    /// Step 5. Problems are logged, never returned.
    async fn remove_checkout(&self, repo: &Path, checkout: &Path) {
        let unregistered = exec!(repo; [self.git.as_str()]; "worktree", "remove", "--force", checkout)
            .await
            .is_ok();

        if tokio::fs::try_exists(checkout).await.unwrap_or(true)
            && let Err(e) = tokio::fs::remove_dir_all(checkout).await
        {
            let err = RenderError::Cleanup(format!("{}: {e}", checkout.display()));
            log!("warn"; "{err}");
        }
        // drops the registration of a checkout whose directory is gone
        if !unregistered {
            exec!(repo; [self.git.as_str()]; "worktree", "prune").await.ok();
        }
    }
}

/// Fresh `<temp_root>/jsonnet-head-<unix millis>-<random base36>` path.
fn checkout_dir(temp_root: &Path) -> PathBuf {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis());
    let suffix = to_base36(rand::thread_rng().r#gen::<u64>());
    temp_root.join(format!("{CHECKOUT_PREFIX}{millis}-{suffix}"))
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = Vec::new();
    loop {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
