// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build command: one production compile, then packaging.

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use rugopa::bundler::{BuildMode, BundlerConfigBuilder};
use rugopa::config::ProjectConfig;
use rugopa::orchestrator::Orchestrator;
use rugopa::package::package;
use rugopa::workspace::Workspace;
use std::path::Path;
use std::time::Duration;

use crate::toolchain::create_bundler;

/// Compiles the project at `work_root` in production mode and writes
/// `statics.zip` and `views.zip` into the dist directory.
pub async fn run(work_root: &Path, verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let config = ProjectConfig::load(work_root)?;
    let workspace = Workspace::layout(work_root);

    // Validate everything before the run directory is touched
    let bundler_config = BundlerConfigBuilder::new(&config, &workspace, BuildMode::Production).build()?;
    let bundler = create_bundler(&config.bundler, work_root, verbose, quiet)?;
    workspace.reset()?;
    bundler_config.write_entry()?;

    let bundler_name = bundler.name().to_string();
    let orchestrator = Orchestrator::new(bundler, bundler_config);

    let pb = if quiet || verbose {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(format!("Compiling with {}...", bundler_name));
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    };

    let result = orchestrator.build_once().await;
    pb.finish_and_clear();

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            eprintln!("  {} {}", style("✗").red(), style("Compile failed.").red());
            return Err(e.into());
        }
    };

    if !quiet {
        println!(
            "  {} {} {}",
            style("✓").green(),
            style(format!("Compiled {} file(s)", stats.outputs.len())).dim(),
            style(format!("{}ms", stats.duration.as_millis())).dim()
        );
    }

    let dist = config.dist_root(work_root);
    let output = package(&workspace, &dist)?;

    if !quiet {
        for archive in &output.archives {
            println!(
                "  {} {}",
                style("Written").green(),
                archive.strip_prefix(work_root).unwrap_or(archive).display()
            );
        }
        println!();
        println!(" - {}", style("Done.").green().bold());
    }

    Ok(())
}
