// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Bundler toolchain module for rugopa-cli.
//!
//! This module locates the project's bundler (webpack or Vite), writes the
//! generated bundler configuration into the run directory and executes the
//! bundler as a child process with filtered output.

pub mod output;
pub mod types;
mod vite;
mod webpack;

use rugopa::bundler::{BuildStats, Bundler, BundlerConfig};
use rugopa::config::{BundlerKind, BundlerSettings};
use rugopa::error::CompileError;
use rugopa::scan::scan_tree;
use serde_json::Value;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;

use self::output::{spawn_filtered_reader, OutputFilter};
pub use self::types::{Tool, ToolCommand, ToolchainError, ToolchainResult};
pub use self::vite::ViteBundler;
pub use self::webpack::WebpackBundler;

/// Serialized [`BundlerConfig`] read by the generated config files.
pub const BUNDLER_JSON: &str = "bundler.json";

const JSON_PLACEHOLDER: &str = "__RUGOPA_BUNDLER_JSON__";

/// Picks the bundler for a project.
///
/// `auto` selects Vite when `package.json` lists `vite` in its dependencies
/// or dev dependencies, and webpack otherwise (including when there is no
/// `package.json`).
pub fn detect_tool(kind: BundlerKind, work_root: &Path) -> ToolchainResult<Tool> {
    match kind {
        BundlerKind::Webpack => Ok(Tool::Webpack),
        BundlerKind::Vite => Ok(Tool::Vite),
        BundlerKind::Auto => {
            let manifest_path = work_root.join("package.json");
            if !manifest_path.exists() {
                return Ok(Tool::Webpack);
            }

            let content = fs::read_to_string(&manifest_path)?;
            let manifest: Value = serde_json::from_str(&content).map_err(|source| {
                ToolchainError::InvalidPackageJson {
                    path: manifest_path.clone(),
                    source,
                }
            })?;

            let declares_vite = ["dependencies", "devDependencies"]
                .iter()
                .any(|section| manifest.get(section).and_then(|deps| deps.get("vite")).is_some());

            Ok(if declares_vite { Tool::Vite } else { Tool::Webpack })
        }
    }
}

/// Finds how to launch `tool`.
///
/// An explicit `command` wins. Otherwise the project-local
/// `node_modules/.bin/<tool>` is used, falling back to `npx`.
pub fn locate(tool: Tool, command: Option<&Path>, work_root: &Path) -> ToolchainResult<ToolCommand> {
    if let Some(command) = command {
        // Bare names are looked up on PATH by the OS
        if command.components().count() == 1 && !command.is_absolute() {
            return Ok(ToolCommand::direct(tool, command));
        }

        let resolved = work_root.join(command);
        if !resolved.exists() {
            return Err(ToolchainError::CommandNotFound(resolved));
        }
        return Ok(ToolCommand::direct(tool, resolved));
    }

    let bin_name = if cfg!(target_os = "windows") {
        format!("{}.cmd", tool.as_str())
    } else {
        tool.as_str().to_string()
    };

    let local = work_root.join("node_modules").join(".bin").join(bin_name);
    if local.exists() {
        tracing::debug!("Using project-local {}", local.display());
        return Ok(ToolCommand::direct(tool, local));
    }

    tracing::debug!("{} not installed locally, falling back to npx", tool.as_str());
    Ok(ToolCommand::npx(tool))
}

/// Creates the bundler selected by `settings` for the project at `work_root`.
pub fn create_bundler(
    settings: &BundlerSettings,
    work_root: &Path,
    verbose: bool,
    quiet: bool,
) -> ToolchainResult<Arc<dyn Bundler>> {
    let tool = detect_tool(settings.kind, work_root)?;
    let command = locate(tool, settings.command.as_deref(), work_root)?;
    let filter = OutputFilter::new(tool.as_str(), verbose).with_quiet(quiet);

    tracing::info!("Using {} ({})", tool.as_str(), command.display());

    Ok(match tool {
        Tool::Webpack => Arc::new(WebpackBundler::new(command, filter)),
        Tool::Vite => Arc::new(ViteBundler::new(command, filter)),
    })
}

/// Writes `bundler.json` and the tool config generated from `template` into
/// the run directory. Returns the config file path.
pub(crate) fn write_generated(
    config: &BundlerConfig,
    template: &str,
    file_name: &str,
) -> Result<PathBuf, CompileError> {
    let json_path = config.run_root.join(BUNDLER_JSON);
    let json = serde_json::to_string_pretty(config).map_err(|e| CompileError::Io {
        path: json_path.clone(),
        source: std::io::Error::other(e),
    })?;
    fs::write(&json_path, json).map_err(|source| CompileError::Io {
        path: json_path.clone(),
        source,
    })?;

    let config_path = config.run_root.join(file_name);
    fs::write(&config_path, template.replace(JSON_PLACEHOLDER, BUNDLER_JSON)).map_err(|source| {
        CompileError::Io {
            path: config_path.clone(),
            source,
        }
    })?;

    Ok(config_path)
}

/// Runs a tool to completion, forwarding filtered output.
///
/// Returns every output line on success.
pub(crate) async fn run_tool(
    command: &ToolCommand,
    args: &[OsString],
    cwd: &Path,
    filter: &Arc<OutputFilter>,
) -> Result<Vec<String>, CompileError> {
    let mut cmd = command.command(cwd);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!("Spawning {} {:?}", command.display(), args);
    let mut child = cmd
        .spawn()
        .map_err(|e| CompileError::Launch(format!("{}: {}", command.display(), e)))?;

    let stdout = child.stdout.take().map(|s| spawn_filtered_reader(s, filter.clone()));
    let stderr = child.stderr.take().map(|s| spawn_filtered_reader(s, filter.clone()));

    let status = child
        .wait()
        .await
        .map_err(|e| CompileError::Launch(format!("{}: {}", command.display(), e)))?;

    let mut lines = Vec::new();
    for reader in [stdout, stderr].into_iter().flatten() {
        lines.extend(reader.await.unwrap_or_default());
    }

    filter.mark_first_build_complete();

    if !status.success() {
        return Err(CompileError::Failed {
            code: status.code(),
            output: filter.failure_report(&lines),
        });
    }

    Ok(lines)
}

/// Summarizes a finished run.
pub(crate) fn collect_stats(
    config: &BundlerConfig,
    start: Instant,
    lines: &[String],
    filter: &OutputFilter,
) -> BuildStats {
    BuildStats {
        duration: start.elapsed(),
        outputs: scan_tree(&config.output.dir),
        warnings: filter.warnings(lines),
    }
}
