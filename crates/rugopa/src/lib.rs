// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! # rugopa
//!
//! Build-and-serve pipeline for template-driven sites.
//!
//! A project declares its assets, static files, templates and routes in
//! `rugopa.toml`. rugopa turns that descriptor into a bundler invocation,
//! keeps the compiled output in a private workspace, serves it with
//! server-rendered views during development and packages it for
//! distribution.
//!
//! ## Features
//!
//! - Declarative project descriptor (`rugopa.toml`)
//! - Bundler configuration synthesized per run (webpack or Vite)
//! - Coalesced, serialized rebuilds in watch mode
//! - Live reload over a WebSocket with per-client debouncing
//! - Route pipelines executed through a small service broker
//! - Zip packaging of the compiled drives
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rugopa::{BuildMode, BundlerConfigBuilder, ProjectConfig, Workspace};
//!
//! let project = ProjectConfig::load(work_root)?;
//! let workspace = Workspace::prepare(work_root)?;
//! let config = BundlerConfigBuilder::new(&project, &workspace, BuildMode::Production).build()?;
//! config.write_entry()?;
//! ```

/// Project descriptor loading.
pub mod config;
/// Error types.
pub mod error;
/// Run-time workspace and drives.
pub mod workspace;
/// Directory listings and path helpers.
pub mod scan;
/// Route translation and matching.
pub mod routes;
/// Bundler configuration and the bundler seam.
pub mod bundler;
/// Build and watch state machine.
pub mod orchestrator;
/// Live-reload client registry.
pub mod livereload;
/// Service broker, pipeline execution and built-in services.
pub mod broker;
/// Archiving compiled drives for distribution.
pub mod package;

pub use bundler::{BuildMode, BuildStats, Bundler, BundlerConfig, BundlerConfigBuilder};
pub use config::{BundlerKind, ProjectConfig, RouteSpec};
pub use error::{BrokerError, CompileError, ConfigError, Error, PackagingError, Result, WorkspaceError};
pub use livereload::{ClientId, ClientRegistry};
pub use orchestrator::{BuildState, Orchestrator};
pub use routes::{RoutePipeline, RouteTable};
pub use workspace::{Drive, Workspace};
