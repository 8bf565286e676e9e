// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

use clap::Parser;
use rugopa_cli::commands;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rugopa")]
#[command(author = "Maravilla Labs")]
#[command(version)]
#[command(about = "Build, watch and serve template-driven sites", long_about = None)]
struct Cli {
    /// Run one production build and package it instead of dev mode
    #[arg(long)]
    build: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Verbose mode: show all bundler output without filtering
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: only show errors (useful for CI)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Project directory (defaults to the current directory)
    #[arg(short = 'C', long = "cwd", value_name = "DIR")]
    cwd: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with the specified log level
    let filter = EnvFilter::try_new(&cli.log_level)
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let work_root = match cli.cwd {
        Some(dir) => std::fs::canonicalize(&dir)
            .map_err(|e| anyhow::anyhow!("Cannot use {} as project directory: {}", dir.display(), e))?,
        None => std::env::current_dir()?,
    };

    if cli.build {
        commands::build::run(&work_root, cli.verbose, cli.quiet).await
    } else {
        commands::dev::run(&work_root, cli.verbose, cli.quiet).await
    }
}
