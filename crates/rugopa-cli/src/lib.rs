// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

// Warn on missing documentation for public items
#![warn(missing_docs)]

//! rugopa CLI library.
//!
//! This crate provides the command-line front end of the rugopa pipeline:
//! the webpack and Vite adapters, the file watcher, the content server and
//! the live-reload WebSocket server.
//!
//! # Usage
//!
//! This crate is primarily used through the `rugopa` binary:
//!
//! ```bash
//! rugopa            # Dev mode: watch, rebuild, serve, live reload
//! rugopa --build    # Production build packaged into dist/
//! ```
//!
//! # Configuration
//!
//! Projects are configured via `rugopa.toml` at the project root.

/// CLI commands (dev, build).
pub mod commands;
/// Content server and live reload.
pub mod server;
/// Bundler discovery and process-backed bundlers (webpack, Vite).
pub mod toolchain;
/// File system watching for dev mode.
pub mod watcher;
