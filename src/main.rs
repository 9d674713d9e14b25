//! jrender - render Jsonnet to YAML, diff against HEAD, live-preview on save.

mod app;
mod cli;
mod compare;
mod config;
mod deps;
mod error;
mod host;
mod logger;
mod registry;
mod render;
mod session;
mod utils;
mod watch;

#[cfg(all(test, unix))]
mod testing;

use anyhow::{Context, Result};
use app::{App, ToolStatus};
use clap::Parser;
use cli::{Cli, Commands};
use colored::Colorize;
use config::RenderConfig;
use host::{Host, TerminalHost};
use registry::Registry;
use std::{path::PathBuf, process::ExitCode, sync::Arc};
use watch::WatchHub;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = RenderConfig::load(&cli)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let ok = runtime.block_on(run(&cli, config))?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

/// Run one command. `Ok(false)` means its failure was already reported.
async fn run(cli: &Cli, config: RenderConfig) -> Result<bool> {
    if matches!(cli.command, Commands::Check) {
        return Ok(check(&config).await);
    }

    let registry = Arc::new(Registry::new());
    let host: Arc<dyn Host> = Arc::new(TerminalHost::new(
        Arc::clone(&registry),
        config.output.clone(),
    ));
    let hub = match cli.command {
        Commands::Live { .. } => WatchHub::spawn(config.live.debounce())
            .context("Failed to start file watcher")?,
        _ => WatchHub::detached(),
    };

    let Ok(app) = App::start(config, registry, host, hub).await else {
        return Ok(false);
    };

    Ok(match &cli.command {
        Commands::Render { file } => app.render_file(file).await.is_ok(),
        Commands::Compare { file } => app.compare_file(file).await.is_ok(),
        Commands::Live { files } => live(&app, files).await?,
        Commands::Check => true,
    })
}

/// Open a live session per file and keep them running until Ctrl+C.
async fn live(app: &App, files: &[PathBuf]) -> Result<bool> {
    for file in files {
        // failures are reported by the app; the session may still recover
        app.live_preview(file).await.ok();
    }
    if app.live().is_empty() {
        return Ok(false);
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .context("Failed to set Ctrl+C handler")?;

    log!("live"; "{} session(s) running, press Ctrl+C to stop", app.live().len());
    rx.recv().await;

    app.close_all_live();
    log!("live"; "stopped");
    Ok(true)
}

/// Print each tool's availability. Succeeds when rendering is possible.
async fn check(config: &RenderConfig) -> bool {
    let status = ToolStatus::probe(config).await;

    let found = if config.config_path.exists() { "" } else { " (not found, using defaults)" };
    log!("check"; "config {}{found}", config.config_path.display());

    for (role, program, ok) in [
        ("evaluator", &config.tools.evaluator, status.evaluator),
        ("converter", &config.tools.converter, status.converter),
        ("git", &config.tools.git, status.git),
    ] {
        let location = which::which(program)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| "not found".into());
        let mark = if ok { "✓".green() } else { "✗".red() };
        log!("check"; "{mark} {role:<9} {program} ({location})");
    }

    let missing = status.missing(config);
    if !missing.is_empty() {
        log!("warn"; "Missing required tools: {}. Please install them and reload.", missing.join(", "));
    }
    status.can_render()
}
