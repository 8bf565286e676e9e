// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Error types for the rugopa pipeline.
//!
//! Each stage of a run owns one error type so callers can tell a fatal
//! setup problem apart from a recoverable compile failure.
//!
//! # Error Categories
//!
//! - [`ConfigError`]: missing or malformed project descriptor, or a path it
//!   references that does not exist. Raised before any workspace mutation.
//! - [`WorkspaceError`]: filesystem failure while resetting `.rugopa`.
//! - [`CompileError`]: the bundler reported a failed build. Fatal in build
//!   mode, logged and skipped in dev mode.
//! - [`PackagingError`]: archiving or moving the drives after a build.
//! - [`BrokerError`]: a service action failed while answering a request.
//!
//! Live-reload connection failures never surface as errors: they are
//! confined to the connection that produced them.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error aggregating every stage of a run.
#[derive(Debug, Error)]
pub enum Error {
    /// Project descriptor problem.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Workspace reset failure.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// Bundler failure.
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Archive or distribution failure.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// Service action failure.
    #[error(transparent)]
    Broker(#[from] BrokerError),
}

/// Errors raised while loading or validating `rugopa.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The descriptor file does not exist.
    #[error("Project descriptor not found: {0}")]
    NotFound(PathBuf),

    /// The descriptor could not be read.
    #[error("Failed to read {path}: {source}")]
    Read {
        /// Descriptor path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The descriptor is not valid TOML or has wrong field types.
    #[error("Invalid project descriptor {path}: {source}")]
    Parse {
        /// Descriptor path.
        path: PathBuf,
        /// Underlying parse error.
        source: toml::de::Error,
    },

    /// A route uses an HTTP method we cannot route.
    #[error("Unsupported HTTP method '{method}' for route {path}")]
    InvalidMethod {
        /// The method as written in the descriptor.
        method: String,
        /// The route path.
        path: String,
    },

    /// A route path cannot be turned into a matcher.
    #[error("Invalid route pattern '{0}'")]
    InvalidPattern(String),

    /// The configured source directory is missing.
    #[error("Source directory does not exist: {0}")]
    MissingSourceDir(PathBuf),

    /// An asset, static file or template listed in the descriptor is missing.
    #[error("{kind} not found: {path}")]
    MissingSource {
        /// Which list referenced the path (asset, static, template).
        kind: &'static str,
        /// Absolute path that was expected.
        path: PathBuf,
    },
}

/// Filesystem failure while preparing the run-time workspace.
#[derive(Debug, Error)]
#[error("Failed to {action} {path}: {source}")]
pub struct WorkspaceError {
    /// What we were doing ("remove", "create", "write").
    pub action: &'static str,
    /// The path involved.
    pub path: PathBuf,
    /// Underlying I/O error.
    #[source]
    pub source: std::io::Error,
}

impl WorkspaceError {
    pub(crate) fn new(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self {
            action,
            path: path.into(),
            source,
        }
    }
}

/// The bundler reported a failed build.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The bundler ran and exited unsuccessfully.
    #[error("Bundler failed{}: {output}", exit_suffix(.code))]
    Failed {
        /// Process exit code if one was reported.
        code: Option<i32>,
        /// Captured diagnostics.
        output: String,
    },

    /// The bundler could not be started at all.
    #[error("Failed to launch bundler: {0}")]
    Launch(String),

    /// Writing generated inputs for the bundler failed.
    #[error("Failed to write bundler input {path}: {source}")]
    Io {
        /// File being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

fn exit_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" with exit code {}", c))
        .unwrap_or_default()
}

/// Failure while archiving drives or moving them into the distribution dir.
///
/// A failure after the staging directory was swapped in cannot be undone;
/// the message names the path that was being touched.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// Filesystem failure.
    #[error("Failed to {action} {path}: {source}")]
    Io {
        /// What we were doing.
        action: &'static str,
        /// Path involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The zip writer failed.
    #[error("Failed to write archive {path}: {message}")]
    Archive {
        /// Archive path.
        path: PathBuf,
        /// Error reported by the zip writer.
        message: String,
    },
}

/// Errors raised by the service broker and its services.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// No service is registered under the name.
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// The service does not expose the action.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// Action name is not of the form `service.action`.
    #[error("Invalid action name '{0}', expected 'service.action'")]
    InvalidActionName(String),

    /// Calls are rejected until [`crate::broker::ServiceBroker::start`] ran.
    #[error("Broker is not started")]
    NotStarted,

    /// Input is missing a required field or has the wrong type.
    #[error("Invalid input for {action}: {message}")]
    InvalidInput {
        /// Fully-qualified action name.
        action: String,
        /// What was wrong.
        message: String,
    },

    /// A drive was used before `storage.setConfig` enabled it.
    #[error("Drive '{drive}' is not configured for space '{space}'")]
    DriveNotConfigured {
        /// Space identifier.
        space: String,
        /// Drive name.
        drive: String,
    },

    /// The requested resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Template rendering failed.
    #[error("Render error in {entry}: {message}")]
    Render {
        /// Template entry being rendered.
        entry: String,
        /// Error reported by the template engine.
        message: String,
    },

    /// Filesystem failure inside a service.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    /// Returns true when the error should be reported as a missing resource.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::NotFound(_))
    }
}

/// Result type alias for rugopa operations.
pub type Result<T> = std::result::Result<T, Error>;
