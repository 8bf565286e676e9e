// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Type definitions for the bundler toolchain module.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Supported bundler executables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    /// webpack via webpack-cli.
    Webpack,
    /// Vite.
    Vite,
}

impl Tool {
    /// Returns the executable name of this tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Tool::Webpack => "webpack",
            Tool::Vite => "vite",
        }
    }
}

impl std::str::FromStr for Tool {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webpack" | "webpack-cli" => Ok(Tool::Webpack),
            "vite" => Ok(Tool::Vite),
            _ => Err(format!("Unknown tool: {}", s)),
        }
    }
}

/// How to launch a tool: a program plus leading arguments.
///
/// `npx webpack` is `{ program: "npx", args: ["--no-install", "webpack"] }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Tool this command launches.
    pub tool: Tool,
    /// Executable to spawn.
    pub program: PathBuf,
    /// Arguments placed before the tool's own arguments.
    pub args: Vec<OsString>,
}

impl ToolCommand {
    /// Runs `program` directly.
    pub fn direct(tool: Tool, program: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Runs the tool through `npx`, without installing missing packages.
    pub fn npx(tool: Tool) -> Self {
        let program = if cfg!(target_os = "windows") { "npx.cmd" } else { "npx" };
        Self {
            tool,
            program: PathBuf::from(program),
            args: vec!["--no-install".into(), tool.as_str().into()],
        }
    }

    /// Builds a tokio command for this tool running in `cwd`.
    pub fn command(&self, cwd: &Path) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.args(&self.args).current_dir(cwd);
        cmd
    }

    /// Human-readable command line, for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.to_string_lossy().into_owned())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Errors related to toolchain discovery.
#[derive(Debug, Error)]
pub enum ToolchainError {
    /// `package.json` exists but cannot be parsed.
    #[error("Invalid package.json at {path}: {source}")]
    InvalidPackageJson {
        /// Manifest path.
        path: PathBuf,
        /// Parse error.
        source: serde_json::Error,
    },

    /// The configured bundler command does not exist.
    #[error("Bundler command not found: {0}")]
    CommandNotFound(PathBuf),

    /// An I/O error occurred (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for toolchain operations
pub type ToolchainResult<T> = Result<T, ToolchainError>;
