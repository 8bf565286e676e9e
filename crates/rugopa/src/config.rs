// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Project configuration.
//!
//! Configuration is loaded from `rugopa.toml` at the project root.
//!
//! # Example Configuration
//!
//! ```toml
//! source_dir = "src"
//! assets = ["assets/style.css", "assets/main.js", "images"]
//! statics = ["favicon.ico"]
//! templates = ["parts/header.ejs", "parts/footer.ejs", "about.html"]
//!
//! [[routes]]
//! method = "get"
//! path = "/"
//! view = "index.ejs"
//!
//! [mocks]
//! db = [{ name = "Foo", desc = "Bar" }]
//!
//! [modules]
//! http = "node_modules/axios/index.js"
//!
//! [dev]
//! port = 3000
//! livereload_port = 3001
//!
//! [build]
//! dist_dir = "dist"
//!
//! [bundler]
//! kind = "webpack"
//! ```

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Name of the project descriptor file.
pub const CONFIG_FILE: &str = "rugopa.toml";

/// Main configuration structure loaded from `rugopa.toml`.
///
/// Loaded once per run and never mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Directory holding sources, relative to the project root (default: "src").
    #[serde(default = "default_source_dir", alias = "sourceDir")]
    pub source_dir: PathBuf,

    /// Assets handed to the bundler, in declaration order.
    #[serde(default)]
    pub assets: Vec<PathBuf>,

    /// Files copied verbatim into the statics drive.
    #[serde(default)]
    pub statics: Vec<PathBuf>,

    /// Templates compiled through the bundler's HTML plugin.
    #[serde(default)]
    pub templates: Vec<PathBuf>,

    /// Server-rendered routes, in declaration order.
    #[serde(default)]
    pub routes: Vec<RouteSpec>,

    /// Mock data sets, kept opaque.
    #[serde(default)]
    pub mocks: BTreeMap<String, serde_json::Value>,

    /// Script or library references injected into every render.
    #[serde(default)]
    pub modules: BTreeMap<String, PathBuf>,

    /// Development server settings.
    #[serde(default)]
    pub dev: DevConfig,

    /// Production build settings.
    #[serde(default)]
    pub build: BuildConfig,

    /// Bundler selection.
    #[serde(default)]
    pub bundler: BundlerSettings,
}

/// A declared server-rendered route.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct RouteSpec {
    /// HTTP method (default: "GET").
    #[serde(default = "default_method")]
    pub method: String,
    /// URL pattern, e.g. `/` or `/posts/:slug`.
    pub path: String,
    /// Template entry inside the views drive.
    pub view: String,
}

/// Development server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DevConfig {
    /// Content server port (default: 3000).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Host to bind both servers to (default: "127.0.0.1").
    #[serde(default = "default_host")]
    pub host: String,
    /// Live-reload WebSocket port (default: 3001).
    #[serde(default = "default_livereload_port")]
    pub livereload_port: u16,
    /// Per-connection send debounce window in milliseconds (default: 100).
    #[serde(default = "default_send_debounce_ms")]
    pub send_debounce_ms: u64,
    /// Window collecting file changes into one rebuild, in milliseconds (default: 300).
    #[serde(default = "default_aggregate_timeout_ms")]
    pub aggregate_timeout_ms: u64,
    /// Glob patterns ignored by the file watcher.
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Production build configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Output directory for the two archives (default: "dist").
    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,
}

/// Which bundler drives the compilation.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BundlerKind {
    /// Pick Vite when `package.json` depends on it, webpack otherwise.
    #[default]
    Auto,
    /// webpack with html/copy/css-extract plugins.
    Webpack,
    /// Vite in library-less app mode.
    Vite,
}

/// Bundler configuration section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundlerSettings {
    /// Bundler selection (default: auto).
    #[serde(default)]
    pub kind: BundlerKind,
    /// Explicit executable, bypassing `node_modules/.bin` lookup.
    #[serde(default)]
    pub command: Option<PathBuf>,
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("src")
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_livereload_port() -> u16 {
    3001
}

fn default_send_debounce_ms() -> u64 {
    100
}

fn default_aggregate_timeout_ms() -> u64 {
    300
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            livereload_port: default_livereload_port(),
            send_debounce_ms: default_send_debounce_ms(),
            aggregate_timeout_ms: default_aggregate_timeout_ms(),
            ignore: Vec::new(),
        }
    }
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            dist_dir: default_dist_dir(),
        }
    }
}

impl ProjectConfig {
    /// Loads `rugopa.toml` from `work_root` and validates the source directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file is missing, unreadable, malformed,
    /// declares a route with an unknown method, or points at a source
    /// directory that does not exist.
    pub fn load(work_root: &Path) -> Result<Self, ConfigError> {
        let config_path = work_root.join(CONFIG_FILE);

        if !config_path.exists() {
            return Err(ConfigError::NotFound(config_path));
        }

        let content = fs::read_to_string(&config_path).map_err(|source| ConfigError::Read {
            path: config_path.clone(),
            source,
        })?;

        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: config_path,
            source,
        })?;

        config.validate(work_root)?;
        Ok(config)
    }

    /// Parses a descriptor without touching the filesystem.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Absolute source directory for a project rooted at `work_root`.
    pub fn source_root(&self, work_root: &Path) -> PathBuf {
        work_root.join(&self.source_dir)
    }

    /// Absolute distribution directory for a project rooted at `work_root`.
    pub fn dist_root(&self, work_root: &Path) -> PathBuf {
        work_root.join(&self.build.dist_dir)
    }

    fn validate(&self, work_root: &Path) -> Result<(), ConfigError> {
        let src = self.source_root(work_root);
        if !src.is_dir() {
            return Err(ConfigError::MissingSourceDir(src));
        }

        for route in &self.routes {
            route.normalized_method()?;
        }

        Ok(())
    }
}

impl RouteSpec {
    /// Upper-cased method, rejecting verbs the content server cannot route.
    pub fn normalized_method(&self) -> Result<String, ConfigError> {
        let method = self.method.trim().to_ascii_uppercase();
        let method = if method.is_empty() { default_method() } else { method };

        match method.as_str() {
            "GET" | "POST" | "PUT" | "PATCH" | "DELETE" | "HEAD" | "OPTIONS" => Ok(method),
            _ => Err(ConfigError::InvalidMethod {
                method: self.method.clone(),
                path: self.path.clone(),
            }),
        }
    }
}
