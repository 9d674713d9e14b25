//! Process-wide state and the user-facing operations.
//!
//! [`App`] wires the registry, the host, the renderer, live sessions and
//! the compare orchestrator together. Each operation reports its failure to
//! the host exactly once and also returns it, so the caller only decides
//! the exit status.

use crate::{
    compare::{Comparison, VersionCompare},
    config::RenderConfig,
    error::{RenderError, Result},
    host::Host,
    registry::{DocUri, Registry, local_timestamp},
    render::Renderer,
    session::LivePreview,
    utils::{exec::probe, path::absolutize},
    watch::WatchHub,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

const UNSUPPORTED_FILE: &str = "Not a Jsonnet/libsonnet file.";

/// Availability of each external tool, in probe order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub evaluator: bool,
    pub converter: bool,
    pub git: bool,
}

impl ToolStatus {
    pub async fn probe(config: &RenderConfig) -> Self {
        Self {
            evaluator: probe(&config.tools.evaluator).await,
            converter: probe(&config.tools.converter).await,
            git: probe(&config.tools.git).await,
        }
    }

    /// Names of the missing tools: evaluator, converter, git.
    pub fn missing(&self, config: &RenderConfig) -> Vec<String> {
        [
            (self.evaluator, &config.tools.evaluator),
            (self.converter, &config.tools.converter),
            (self.git, &config.tools.git),
        ]
        .into_iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| name.clone())
        .collect()
    }

    /// Render and live preview need the evaluator and the converter.
    pub const fn can_render(&self) -> bool {
        self.evaluator && self.converter
    }
}

pub struct App {
    config: RenderConfig,
    registry: Arc<Registry>,
    host: Arc<dyn Host>,
    renderer: Arc<Renderer>,
    live: LivePreview,
    compare: VersionCompare,
    tools: ToolStatus,
}

impl App {
    /// Probe the external tools and build the application.
    ///
    /// # Errors
    /// [`RenderError::ToolUnavailable`] naming every missing tool when the
    /// evaluator or the converter is missing. A missing git only disables
    /// [`App::compare_file`].
    pub async fn start(
        config: RenderConfig,
        registry: Arc<Registry>,
        host: Arc<dyn Host>,
        hub: Arc<WatchHub>,
    ) -> Result<Self> {
        let tools = ToolStatus::probe(&config).await;
        if !tools.can_render() {
            let err = RenderError::ToolUnavailable(tools.missing(&config));
            host.warning(&err.to_string());
            return Err(err);
        }
        Ok(Self::with_tools(config, registry, host, hub, tools))
    }

    fn with_tools(
        config: RenderConfig,
        registry: Arc<Registry>,
        host: Arc<dyn Host>,
        hub: Arc<WatchHub>,
        tools: ToolStatus,
    ) -> Self {
        let renderer = Arc::new(Renderer::new(&config));
        let live = LivePreview::new(
            Arc::clone(&registry),
            Arc::clone(&host),
            Arc::clone(&renderer),
            hub,
        );
        let compare = VersionCompare::new(
            &config,
            Arc::clone(&registry),
            Arc::clone(&host),
            Arc::clone(&renderer),
        );
        Self {
            config,
            registry,
            host,
            renderer,
            live,
            compare,
            tools,
        }
    }

    #[cfg(test)]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn live(&self) -> &LivePreview {
        &self.live
    }

    /// One-shot render into a fresh `rendered_<ts>_<base>.yaml` document.
    pub async fn render_file(&self, file: &Path) -> Result<DocUri> {
        let result = self.try_render(file).await;
        self.report("Render failed", result)
    }

    async fn try_render(&self, file: &Path) -> Result<DocUri> {
        let file = self.accept(file)?;
        let text = self.renderer.render(&file).await?;
        let uri = DocUri::rendered(&local_timestamp(), &file);
        self.registry.set(&uri, text);
        self.host.show_document(&uri);
        Ok(uri)
    }

    /// Diff the file's rendering at `HEAD` against the working tree.
    pub async fn compare_file(&self, file: &Path) -> Result<Comparison> {
        let result = match self.accept(file) {
            Ok(_) if !self.tools.git => Err(RenderError::ToolUnavailable(vec![self.config.tools.git.clone()])),
            Ok(file) => self.compare.compare(&file).await,
            Err(e) => Err(e),
        };
        self.report("Compare failed", result)
    }

    /// Start or refresh live preview of `file`.
    pub async fn live_preview(&self, file: &Path) -> Result<DocUri> {
        let result = match self.accept(file) {
            Ok(file) => self.live.open(&file).await,
            Err(e) => Err(e),
        };
        self.report("Live preview failed", result)
    }

    /// The host closed `uri`: evict its content and end the live session
    /// that presents it, if any. URIs of other schemes are ignored.
    pub fn close_document(&self, uri: &str) -> bool {
        let Some(uri) = DocUri::parse(uri) else {
            return false;
        };
        let evicted = self.registry.remove(&uri).is_some();
        let stopped = self.live.close(&uri);
        evicted || stopped
    }

    /// Close every live document.
    pub fn close_all_live(&self) {
        for uri in self.live.uris() {
            self.close_document(uri.as_str());
        }
    }

    /// Absolute path of `file` when it has a supported extension.
    fn accept(&self, file: &Path) -> Result<PathBuf> {
        if !self.config.is_supported(file) {
            return Err(RenderError::invalid(UNSUPPORTED_FILE));
        }
        Ok(absolutize(file))
    }

    /// Send a failure to the host once, prefixed unless it was rejected input.
    fn report<T>(&self, prefix: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            match e {
                RenderError::InvalidInput(_) | RenderError::ToolUnavailable(_) => {
                    self.host.error(&e.to_string());
                }
                _ => self.host.error(&format!("{prefix}: {e}")),
            }
        }
        result
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::testing::{HostEvent, RecordingHost, failing_config, fake_config, write};
    use std::time::Duration;
    use tempfile::TempDir;

    const ALL_TOOLS: ToolStatus = ToolStatus {
        evaluator: true,
        converter: true,
        git: true,
    };

    fn app_with(config: RenderConfig, tools: ToolStatus) -> (App, Arc<RecordingHost>, Arc<WatchHub>) {
        let registry = Arc::new(Registry::new());
        let host = RecordingHost::new(Arc::clone(&registry));
        let hub = WatchHub::detached();
        let app = App::with_tools(
            config,
            registry,
            Arc::clone(&host) as Arc<dyn Host>,
            Arc::clone(&hub),
            tools,
        );
        (app, host, hub)
    }

    fn root() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        (dir, root)
    }

    #[tokio::test]
    async fn test_render_file() {
        let (_dir, root) = root();
        let (app, host, _) = app_with(fake_config(&root), ALL_TOOLS);
        let src = write(&root, "prod.jsonnet", r#"[{"a":1},{"b":2}]"#);

        let uri = app.render_file(&src).await.unwrap();
        assert!(uri.name().starts_with("rendered_"));
        assert!(uri.name().ends_with("_prod.yaml"));
        assert_eq!(
            host.events(),
            vec![HostEvent::Shown(uri, "a: 1\n---\nb: 2".into())]
        );
    }

    #[tokio::test]
    async fn test_unsupported_file_has_no_side_effects() {
        let (_dir, root) = root();
        let (app, host, hub) = app_with(fake_config(&root), ALL_TOOLS);
        let src = write(&root, "notes.txt", r#"{"a":1}"#);

        for err in [
            app.render_file(&src).await.unwrap_err(),
            app.compare_file(&src).await.unwrap_err(),
            app.live_preview(&src).await.unwrap_err(),
        ] {
            assert!(matches!(err, RenderError::InvalidInput(_)));
        }

        assert!(app.registry().is_empty());
        assert!(app.live().is_empty());
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(
            host.events(),
            vec![HostEvent::Error(UNSUPPORTED_FILE.into()); 3]
        );
    }

    #[tokio::test]
    async fn test_render_failure_reported_once() {
        let (_dir, root) = root();
        let (app, host, _) = app_with(failing_config(&root, "RUNTIME ERROR: boom"), ALL_TOOLS);
        let src = write(&root, "app.jsonnet", "{}");

        app.render_file(&src).await.unwrap_err();
        assert_eq!(
            host.events(),
            vec![HostEvent::Error("Render failed: RUNTIME ERROR: boom".into())]
        );
        assert!(app.registry().is_empty());
    }

    #[tokio::test]
    async fn test_compare_without_git() {
        let (_dir, root) = root();
        let tools = ToolStatus {
            git: false,
            ..ALL_TOOLS
        };
        let (app, host, _) = app_with(fake_config(&root), tools);
        let src = write(&root, "app.jsonnet", "{}");

        let err = app.compare_file(&src).await.unwrap_err();
        assert!(matches!(err, RenderError::ToolUnavailable(_)));
        assert_eq!(
            host.events(),
            vec![HostEvent::Error(
                "Missing required tools: git. Please install them and reload.".into()
            )]
        );
    }

    #[tokio::test]
    async fn test_close_document_tears_down_live_session() {
        let (_dir, root) = root();
        let (app, host, hub) = app_with(fake_config(&root), ALL_TOOLS);
        let src = write(&root, "app.jsonnet", r#"{"a":1}"#);

        let uri = app.live_preview(&src).await.unwrap();
        assert!(app.registry().contains(&uri));
        assert_eq!(hub.subscriber_count(), 1);

        assert!(app.close_document(uri.as_str()));
        assert!(!app.registry().contains(&uri));
        assert!(app.live().is_empty());
        assert_eq!(hub.subscriber_count(), 0);

        hub.dispatch(&src);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(host.changes().is_empty());
        assert!(!app.registry().contains(&uri));
    }

    #[tokio::test]
    async fn test_close_document_other_documents() {
        let (_dir, root) = root();
        let (app, _, _) = app_with(fake_config(&root), ALL_TOOLS);
        let src = write(&root, "app.jsonnet", r#"{"a":1}"#);

        let uri = app.render_file(&src).await.unwrap();
        assert!(!app.close_document("file:///tmp/app.jsonnet"));
        assert!(app.registry().contains(&uri));

        assert!(app.close_document(uri.as_str()));
        assert!(app.registry().is_empty());
        assert!(!app.close_document(uri.as_str()));
    }

    #[tokio::test]
    async fn test_close_all_live() {
        let (_dir, root) = root();
        let (app, _, hub) = app_with(fake_config(&root), ALL_TOOLS);
        let a = write(&root, "a.jsonnet", r#"{"a":1}"#);
        let b = write(&root, "b.jsonnet", r#"{"b":1}"#);
        app.live_preview(&a).await.unwrap();
        app.live_preview(&b).await.unwrap();

        app.close_all_live();
        assert!(app.live().is_empty());
        assert!(app.registry().is_empty());
        assert!(hub.watched_dirs().is_empty());
    }

    #[tokio::test]
    async fn test_start_fails_without_evaluator() {
        let (_dir, root) = root();
        let mut config = fake_config(&root);
        config.tools.evaluator = "jrender-no-such-evaluator".into();
        let registry = Arc::new(Registry::new());
        let host = RecordingHost::new(Arc::clone(&registry));

        let result = App::start(
            config,
            registry,
            Arc::clone(&host) as Arc<dyn Host>,
            WatchHub::detached(),
        )
        .await;

        let Err(RenderError::ToolUnavailable(missing)) = result else {
            panic!("expected missing tools");
        };
        assert_eq!(missing[0], "jrender-no-such-evaluator");
        assert_eq!(host.warnings().len(), 1);
        assert!(host.warnings()[0].contains("jrender-no-such-evaluator"));
    }

    #[test]
    fn test_missing_tools_order() {
        let config = RenderConfig::default();
        let status = ToolStatus {
            evaluator: false,
            converter: false,
            git: false,
        };
        assert_eq!(status.missing(&config), vec!["jsonnet", "yq", "git"]);
        assert!(!status.can_render());
        assert!(ALL_TOOLS.missing(&config).is_empty());
    }
}
