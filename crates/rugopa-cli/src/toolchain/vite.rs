// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Vite-backed [`Bundler`].
//!
//! Vite only compiles the entry points. Copy patterns and HTML pages are
//! applied after the Vite run: plain templates are re-resolved and copied
//! and HTML pages get the entry tags listed in Vite's build manifest.

use async_trait::async_trait;
use rugopa::bundler::{BuildStats, Bundler, BundlerConfig, CopyPattern};
use rugopa::error::CompileError;
use rugopa::scan::{normalize, relative_to, scan_tree, to_slash};
use serde::Deserialize;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::output::OutputFilter;
use super::{collect_stats, run_tool, write_generated, ToolCommand};

const CONFIG_TEMPLATE: &str = include_str!("vite.config.mjs");
const CONFIG_FILE: &str = "vite.config.mjs";

/// Manifest locations, Vite 5 first.
const MANIFEST_PATHS: [&str; 2] = [".vite/manifest.json", "manifest.json"];

/// Runs `vite build` against a generated `vite.config.mjs`.
pub struct ViteBundler {
    command: ToolCommand,
    filter: Arc<OutputFilter>,
}

impl ViteBundler {
    /// Creates a bundler launching Vite through `command`.
    pub fn new(command: ToolCommand, filter: OutputFilter) -> Self {
        Self {
            command,
            filter: Arc::new(filter),
        }
    }

    fn args(config_path: OsString, config: &BundlerConfig) -> Vec<OsString> {
        vec![
            "build".into(),
            "--config".into(),
            config_path,
            "--mode".into(),
            config.mode.as_str().into(),
        ]
    }
}

#[async_trait]
impl Bundler for ViteBundler {
    fn name(&self) -> &str {
        "vite"
    }

    async fn run(&self, config: &BundlerConfig) -> Result<BuildStats, CompileError> {
        let start = Instant::now();
        let config_path = write_generated(config, CONFIG_TEMPLATE, CONFIG_FILE)?;

        let args = Self::args(config_path.into_os_string(), config);
        let lines = run_tool(&self.command, &args, &config.work_root, &self.filter).await?;

        let copied = apply_copy_patterns(&config.copy_patterns)?
            + apply_copy_patterns(&config.view_templates.resolve())?;
        let manifest = take_manifest(&config.output.dir)?;
        let pages = emit_pages(config, &manifest)?;
        tracing::debug!("Copied {} file(s), emitted {} page(s)", copied, pages);

        Ok(collect_stats(config, start, &lines, &self.filter))
    }
}

/// One entry of Vite's build manifest.
#[derive(Debug, Clone, Default, Deserialize)]
struct ManifestChunk {
    file: String,
    #[serde(default)]
    css: Vec<String>,
    #[serde(default, rename = "isEntry")]
    is_entry: bool,
}

type Manifest = HashMap<String, ManifestChunk>;

fn io_error(path: &Path, source: io::Error) -> CompileError {
    CompileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn copy_file(from: &Path, to: &Path) -> Result<(), CompileError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| io_error(to, e))?;
    Ok(())
}

/// Copies each pattern source (file or directory) to its destination.
///
/// Returns the number of copied files.
fn apply_copy_patterns(patterns: &[CopyPattern]) -> Result<usize, CompileError> {
    let mut copied = 0;

    for pattern in patterns {
        if pattern.from.is_dir() {
            for relative in scan_tree(&pattern.from) {
                copy_file(&pattern.from.join(&relative), &pattern.to.join(&relative))?;
                copied += 1;
            }
        } else {
            copy_file(&pattern.from, &pattern.to)?;
            copied += 1;
        }
    }

    Ok(copied)
}

/// Reads the build manifest and removes it from the output directory.
///
/// A missing manifest yields an empty one.
fn take_manifest(out_dir: &Path) -> Result<Manifest, CompileError> {
    for candidate in MANIFEST_PATHS {
        let path = out_dir.join(candidate);
        if !path.exists() {
            continue;
        }

        let content = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
        let manifest: Manifest = serde_json::from_str(&content)
            .map_err(|e| io_error(&path, io::Error::new(io::ErrorKind::InvalidData, e)))?;

        fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
        if let Some(parent) = path.parent().filter(|p| *p != out_dir) {
            let _ = fs::remove_dir(parent);
        }

        return Ok(manifest);
    }

    tracing::warn!("No Vite manifest found in {}", out_dir.display());
    Ok(Manifest::new())
}

/// Stylesheet links and module scripts for every entry, in entry order.
fn entry_tags(config: &BundlerConfig, manifest: &Manifest) -> (String, String) {
    let public = &config.output.public_path;
    let mut head = String::new();
    let mut body = String::new();

    for entry in config.entries() {
        let key = relative_to(entry, &config.run_root)
            .map(|p| to_slash(&p))
            .unwrap_or_else(|| to_slash(entry));

        let Some(chunk) = manifest.get(&key).filter(|c| c.is_entry) else {
            continue;
        };

        for css in &chunk.css {
            head.push_str(&format!("<link rel=\"stylesheet\" href=\"{}{}\">\n", public, css));
        }
        body.push_str(&format!(
            "<script type=\"module\" src=\"{}{}\"></script>\n",
            public, chunk.file
        ));
    }

    (head, body)
}

/// Byte offset of the last ASCII case-insensitive occurrence of `tag`.
fn rfind_tag(html: &str, tag: &str) -> Option<usize> {
    html.as_bytes()
        .windows(tag.len())
        .rposition(|w| w.eq_ignore_ascii_case(tag.as_bytes()))
}

/// Inserts `head` before `</head>` and `body` before `</body>`, appending
/// when a closing tag is missing.
fn inject_tags(html: &str, head: &str, body: &str) -> String {
    let mut result = html.to_string();

    match rfind_tag(&result, "</head>") {
        Some(pos) => result.insert_str(pos, head),
        None => result.push_str(head),
    }

    match rfind_tag(&result, "</body>") {
        Some(pos) => result.insert_str(pos, body),
        None => result.push_str(body),
    }

    result
}

/// Writes every HTML page into its drive.
fn emit_pages(config: &BundlerConfig, manifest: &Manifest) -> Result<usize, CompileError> {
    let (head, body) = entry_tags(config, manifest);

    for page in &config.html_pages {
        let content = fs::read_to_string(&page.template).map_err(|e| io_error(&page.template, e))?;
        let output = if page.inject {
            inject_tags(&content, &head, &body)
        } else {
            content
        };

        let target: PathBuf = normalize(&config.output.dir.join(&page.filename));
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
        }
        fs::write(&target, output).map_err(|e| io_error(&target, e))?;
    }

    Ok(config.html_pages.len())
}
