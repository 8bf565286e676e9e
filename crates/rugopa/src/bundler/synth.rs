// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Derivation of a [`BundlerConfig`] from the project configuration.

use std::path::{Path, PathBuf};

use super::{
    BuildMode, BundlerConfig, CopyPattern, HtmlPage, ModuleRule, OutputRules, RuleKind, ViewTemplates,
};
use crate::config::ProjectConfig;
use crate::error::ConfigError;
use crate::scan::{normalize, relative_to, to_slash};
use crate::workspace::{Drive, Workspace};

/// Extensions of view templates copied into the views drive.
pub const TEMPLATE_EXTENSIONS: &[&str] = &["ejs", "jinja", "j2"];

const IMPORT_EXTENSIONS: &[&str] = &["css", "png", "jpg", "jpeg", "svg", "gif"];

/// How a declared asset reaches the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    /// `.js`: an independent bundler entry.
    Script,
    /// Styles and images: imported from the synthesized entry file.
    Import,
    /// Anything else: copied verbatim into the statics drive.
    Copy,
}

/// Classifies an asset path by its extension (case-sensitive, as declared).
pub fn classify(path: &Path) -> AssetKind {
    match path.extension().and_then(|e| e.to_str()) {
        Some("js") => AssetKind::Script,
        Some(ext) if IMPORT_EXTENSIONS.contains(&ext) => AssetKind::Import,
        _ => AssetKind::Copy,
    }
}

fn is_html(path: &Path) -> bool {
    matches!(path.extension().and_then(|e| e.to_str()), Some("html") | Some("htm"))
}

/// Builds a [`BundlerConfig`] from an immutable project configuration.
///
/// ```rust,ignore
/// let config = BundlerConfigBuilder::new(&project, &workspace, BuildMode::Development)
///     .live_reload(client_snippet(3001))
///     .build()?;
/// config.write_entry()?;
/// ```
pub struct BundlerConfigBuilder<'a> {
    project: &'a ProjectConfig,
    workspace: &'a Workspace,
    mode: BuildMode,
    live_reload: Option<String>,
}

impl<'a> BundlerConfigBuilder<'a> {
    /// Starts a builder for the given project, workspace and mode.
    pub fn new(project: &'a ProjectConfig, workspace: &'a Workspace, mode: BuildMode) -> Self {
        Self {
            project,
            workspace,
            mode,
            live_reload: None,
        }
    }

    /// Appends a live-reload client snippet to the entry file.
    ///
    /// Ignored in production mode.
    pub fn live_reload(mut self, snippet: impl Into<String>) -> Self {
        self.live_reload = Some(snippet.into());
        self
    }

    /// Produces the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingSource`] when a declared asset, static
    /// file, template, or route view does not exist under the source
    /// directory. Nothing is written.
    pub fn build(self) -> Result<BundlerConfig, ConfigError> {
        let production = self.mode.is_production();
        let src = self.project.source_root(&self.workspace.work_root);
        let ws = self.workspace;

        let mut imports = Vec::new();
        let mut script_entries = Vec::new();
        let mut copy_patterns = Vec::new();

        for asset in &self.project.assets {
            let asset = normalize(asset);
            let full = existing(&src, &asset, "Asset")?;

            match classify(&asset) {
                AssetKind::Script => script_entries.push(full),
                AssetKind::Import => imports.push(full),
                AssetKind::Copy => copy_patterns.push(CopyPattern {
                    from: full,
                    to: ws.static_dir.join(&asset),
                }),
            }
        }

        for file in &self.project.statics {
            let file = normalize(file);
            let full = existing(&src, &file, "Static file")?;
            copy_patterns.push(CopyPattern {
                from: full,
                to: ws.static_dir.join(&file),
            });
        }

        let declared: Vec<PathBuf> = self.project.templates.iter().map(|t| normalize(t)).collect();
        let mut html_pages = Vec::with_capacity(declared.len());
        for template in &declared {
            let full = existing(&src, template, "Template")?;
            let page = if is_html(template) {
                HtmlPage {
                    template: full,
                    filename: template.clone(),
                    drive: Drive::Statics,
                    inject: true,
                }
            } else {
                let target = ws.view_dir.join(template);
                HtmlPage {
                    template: full,
                    filename: relative_to(&target, &ws.static_dir).unwrap_or(target),
                    drive: Drive::Views,
                    inject: false,
                }
            };
            html_pages.push(page);
        }

        for route in &self.project.routes {
            existing(&src, Path::new(&route.view), "Route view")?;
        }

        // Only directories inside the source tree need skipping
        let skip_dirs: Vec<PathBuf> = [
            ws.run_root.clone(),
            self.project.dist_root(&ws.work_root),
            ws.work_root.join("node_modules"),
        ]
        .iter()
        .filter_map(|dir| dir.strip_prefix(&src).ok().map(normalize))
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();

        let view_templates = ViewTemplates {
            context: src.clone(),
            to: ws.view_dir.clone(),
            extensions: TEMPLATE_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            skip_dirs,
            skip_files: declared,
        };

        let mut entry_source = String::new();
        for import in &imports {
            let spec = relative_to(import, &ws.run_root).unwrap_or_else(|| import.clone());
            entry_source.push_str(&format!("import \"{}\";\n", to_slash(&spec)));
        }
        if !production {
            if let Some(snippet) = &self.live_reload {
                entry_source.push_str(snippet);
                entry_source.push('\n');
            }
        }

        let hashed = |with_hash: &str, plain: &str| {
            if production { with_hash } else { plain }.to_string()
        };

        let output = OutputRules {
            dir: ws.static_dir.clone(),
            filename: hashed("[name].[contenthash].js", "[name].js"),
            css_filename: hashed("[name].[contenthash].css", "[name].css"),
            css_chunk_filename: hashed("[id].[contenthash].css", "[id].css"),
            image_filename: hashed("images/[name].[hash][ext][query]", "images/[name][ext][query]"),
            font_filename: hashed("fonts/[name].[hash][ext][query]", "fonts/[name][ext][query]"),
            public_path: "/".to_string(),
        };

        let rules = vec![
            ModuleRule {
                test: r"\.css$".to_string(),
                kind: RuleKind::Style { extract: production },
            },
            ModuleRule {
                test: r"\.(png|svg|jpg|jpeg|gif)$".to_string(),
                kind: RuleKind::Asset {
                    filename: output.image_filename.clone(),
                },
            },
            ModuleRule {
                test: r"\.(woff|woff2|eot|ttf|otf)$".to_string(),
                kind: RuleKind::Asset {
                    filename: output.font_filename.clone(),
                },
            },
            ModuleRule {
                test: r"\.html$".to_string(),
                kind: RuleKind::Html,
            },
        ];

        tracing::debug!(
            "Synthesized {} config: {} import(s), {} script entr(ies), {} page(s), {} copy pattern(s)",
            self.mode.as_str(),
            imports.len(),
            script_entries.len(),
            html_pages.len(),
            copy_patterns.len()
        );

        Ok(BundlerConfig {
            mode: self.mode,
            work_root: ws.work_root.clone(),
            run_root: ws.run_root.clone(),
            entry: ws.entry_path(),
            entry_source,
            script_entries,
            output,
            rules,
            html_pages,
            copy_patterns,
            view_templates,
            extract_css: production,
            minify: production,
        })
    }
}

fn existing(src: &Path, relative: &Path, kind: &'static str) -> Result<PathBuf, ConfigError> {
    let full = src.join(relative);
    if full.exists() {
        Ok(full)
    } else {
        Err(ConfigError::MissingSource { kind, path: full })
    }
}
