// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Development mode: watch, rebuild, serve and live reload.

use console::style;
use rugopa::bundler::{BuildMode, BuildStats, BundlerConfigBuilder};
use rugopa::config::ProjectConfig;
use rugopa::livereload::{client_snippet, ClientRegistry, RELOAD};
use rugopa::orchestrator::Orchestrator;
use rugopa::routes::{translate, RouteTable};
use rugopa::workspace::Workspace;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::server::http::{create_server, AppState};
use crate::server::livereload::serve_livereload;
use crate::toolchain::create_bundler;
use crate::watcher::{ChangeFilter, FileWatcher};

/// Runs dev mode for the project at `work_root` until Ctrl+C.
pub async fn run(work_root: &Path, verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(work_root)?;
    let workspace = Workspace::layout(work_root);
    let table = RouteTable::new(translate(&config, &workspace)?)?;

    // Validate everything before the run directory is touched
    let bundler_config = BundlerConfigBuilder::new(&config, &workspace, BuildMode::Development)
        .live_reload(client_snippet(config.dev.livereload_port))
        .build()?;
    let bundler = create_bundler(&config.bundler, work_root, verbose, quiet)?;
    workspace.reset()?;
    bundler_config.write_entry()?;

    let state = Arc::new(AppState::start(table, &workspace).await?);
    let registry = Arc::new(ClientRegistry::new(Duration::from_millis(config.dev.send_debounce_ms)));

    let livereload_addr = format!("{}:{}", config.dev.host, config.dev.livereload_port);
    let livereload_registry = registry.clone();
    tokio::spawn(async move {
        if let Err(e) = serve_livereload(&livereload_addr, livereload_registry).await {
            tracing::error!("Live reload server stopped: {}", e);
        }
    });

    let addr = format!("{}:{}", config.dev.host, config.dev.port);
    let server_addr = addr.clone();
    tokio::spawn(async move {
        if let Err(e) = create_server(&server_addr, state).await {
            tracing::error!("Content server stopped: {}", e);
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let filter = ChangeFilter::new(
        work_root,
        vec![workspace.run_root.clone(), config.dist_root(work_root)],
        &config.dev.ignore,
    )?;
    let _watcher = FileWatcher::new(&config.source_root(work_root), filter, tx)?;

    if !quiet {
        println!(
            "{} {}",
            style("Server:").cyan(),
            style(format!("http://{}", addr)).green().bold()
        );
        println!(
            "{} {}",
            style("Live reload:").cyan(),
            style(format!("ws://{}:{}", config.dev.host, config.dev.livereload_port)).dim()
        );
        println!(
            "{} {}",
            style("Status:").cyan(),
            style("Watching for changes...").dim()
        );
        println!();
    }

    let orchestrator = Orchestrator::new(bundler, bundler_config)
        .with_aggregate_timeout(Duration::from_millis(config.dev.aggregate_timeout_ms));

    let on_rebuild = move |stats: &BuildStats| {
        let clients = registry.broadcast(RELOAD);
        tracing::debug!("Reload sent to {} client(s)", clients);

        if !quiet {
            println!(
                "  {} {} {}",
                style("✓").green(),
                style("Compile success. Reload.").dim(),
                style(format!("{}ms", stats.duration.as_millis())).dim()
            );
        }
    };

    tokio::select! {
        _ = orchestrator.watch(rx, on_rebuild) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            if !quiet {
                println!();
                println!("{}", style("Shutting down.").dim());
            }
        }
    }

    Ok(())
}
