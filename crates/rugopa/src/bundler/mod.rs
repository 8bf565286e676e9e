// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Bundler configuration and the bundler seam.
//!
//! [`BundlerConfig`] is a complete, immutable description of one bundler
//! invocation: entry points, output naming, module rules, HTML pages and
//! copy patterns. It is derived from the project configuration and the
//! workspace by [`BundlerConfigBuilder`] and regenerated on every run.
//!
//! The bundler engine itself (webpack, Vite) sits behind the [`Bundler`]
//! trait; the CLI provides process-backed implementations.

mod synth;

pub use synth::{classify, AssetKind, BundlerConfigBuilder, TEMPLATE_EXTENSIONS};

use async_trait::async_trait;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::CompileError;
use crate::scan::scan_tree_excluding;
use crate::workspace::Drive;

/// One-shot production build or continuous development build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// Stable file names, injected styles, no minification, live reload.
    Development,
    /// Content-hashed names, extracted styles, minified output.
    Production,
}

impl BuildMode {
    /// Returns true for [`BuildMode::Production`].
    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Mode string understood by both webpack and Vite.
    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }
}

/// File naming for emitted assets.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutputRules {
    /// Output directory (the statics drive).
    pub dir: PathBuf,
    /// Script bundle name template.
    pub filename: String,
    /// Extracted stylesheet name template.
    pub css_filename: String,
    /// Extracted stylesheet chunk name template.
    pub css_chunk_filename: String,
    /// Emitted image name template.
    pub image_filename: String,
    /// Emitted font name template.
    pub font_filename: String,
    /// Public URL prefix of the statics drive.
    pub public_path: String,
}

/// How files matching a rule are handled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RuleKind {
    /// Stylesheets: extracted to a file or injected at runtime.
    Style {
        /// Emit a separate stylesheet instead of injecting it.
        extract: bool,
    },
    /// Emitted as a standalone file with the given name template.
    Asset {
        /// Name template relative to the output directory.
        filename: String,
    },
    /// Markup loaded through the HTML loader.
    Html,
}

/// A module rule keyed by a case-insensitive file-name regex.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleRule {
    /// Regex source tested against module paths.
    pub test: String,
    /// Handling for matching modules.
    pub kind: RuleKind,
}

/// A template compiled through the bundler's HTML plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HtmlPage {
    /// Absolute template path.
    pub template: PathBuf,
    /// Output file name relative to the statics drive.
    pub filename: PathBuf,
    /// Drive the output ends up in.
    pub drive: Drive,
    /// Inject script and style tags into the output.
    pub inject: bool,
}

/// A file or directory copied unchanged into a drive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CopyPattern {
    /// Absolute source path.
    pub from: PathBuf,
    /// Absolute destination path.
    pub to: PathBuf,
}

/// View templates copied into the views drive, re-evaluated on every run.
///
/// Every file under `context` whose extension is listed in `extensions` is
/// copied to the same relative path under `to`, except the directories in
/// `skip_dirs` and the files in `skip_files`. Both lists are relative to
/// `context`. Templates created during a watch session are picked up by
/// the next compile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewTemplates {
    /// Directory the templates are looked up in (the source directory).
    pub context: PathBuf,
    /// Destination directory (the views drive).
    pub to: PathBuf,
    /// Template extensions, without the dot.
    pub extensions: Vec<String>,
    /// Subtrees never searched: the run, dist and `node_modules` directories.
    pub skip_dirs: Vec<PathBuf>,
    /// Templates handled elsewhere (declared templates go through the HTML plugin).
    pub skip_files: Vec<PathBuf>,
}

impl ViewTemplates {
    /// Expands the templates currently on disk into copy patterns.
    pub fn resolve(&self) -> Vec<CopyPattern> {
        let skip: Vec<PathBuf> = self.skip_dirs.iter().map(|d| self.context.join(d)).collect();

        scan_tree_excluding(&self.context, &skip)
            .into_iter()
            .filter(|file| {
                file.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|ext| self.extensions.iter().any(|x| x == ext))
            })
            .filter(|file| !self.skip_files.contains(file))
            .map(|file| CopyPattern {
                from: self.context.join(&file),
                to: self.to.join(&file),
            })
            .collect()
    }
}

/// Fully-formed description of a bundler invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundlerConfig {
    /// Build mode.
    pub mode: BuildMode,
    /// Project root, used as the bundler's working directory.
    pub work_root: PathBuf,
    /// Run directory, where generated files live.
    pub run_root: PathBuf,
    /// Path of the synthesized entry file.
    pub entry: PathBuf,
    /// Contents of the synthesized entry file.
    pub entry_source: String,
    /// Script assets, each an independent entry, in declaration order.
    pub script_entries: Vec<PathBuf>,
    /// Output naming.
    pub output: OutputRules,
    /// Module rules.
    pub rules: Vec<ModuleRule>,
    /// Templates compiled through the HTML plugin.
    pub html_pages: Vec<HtmlPage>,
    /// Files copied verbatim.
    pub copy_patterns: Vec<CopyPattern>,
    /// Undeclared view templates copied into the views drive.
    pub view_templates: ViewTemplates,
    /// Extract styles into separate files.
    pub extract_css: bool,
    /// Minify scripts and styles.
    pub minify: bool,
}

impl BundlerConfig {
    /// All entry points: the synthesized entry first, then script assets.
    pub fn entries(&self) -> Vec<&Path> {
        std::iter::once(self.entry.as_path())
            .chain(self.script_entries.iter().map(PathBuf::as_path))
            .collect()
    }

    /// Writes the synthesized entry file into the run directory.
    pub fn write_entry(&self) -> Result<(), CompileError> {
        fs::write(&self.entry, &self.entry_source).map_err(|source| CompileError::Io {
            path: self.entry.clone(),
            source,
        })
    }
}

/// Summary of a successful compilation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildStats {
    /// Wall-clock compile time.
    pub duration: Duration,
    /// Files present in the statics drive afterwards, relative to it.
    pub outputs: Vec<PathBuf>,
    /// Warnings reported by the bundler.
    pub warnings: Vec<String>,
}

/// A bundling engine.
///
/// Implementations run one complete compilation of `config` and report
/// success with [`BuildStats`] or failure with [`CompileError`]. The
/// orchestrator never calls `run` concurrently on the same instance.
#[async_trait]
pub trait Bundler: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Compiles `config` once.
    async fn run(&self, config: &BundlerConfig) -> Result<BuildStats, CompileError>;
}
