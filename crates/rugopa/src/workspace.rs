// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Run-time workspace under `<work_root>/.rugopa`.
//!
//! The workspace holds two drives: `statics` (compiled assets and copied
//! files, served as-is) and `views` (templates rendered per request). It is
//! wiped and recreated at the start of every run and must not be shared by
//! two concurrent invocations.

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;

/// Space identifier, also the name of the run directory.
pub const SPACE_ID: &str = ".rugopa";

/// Synthesized bundler entry file name inside the run directory.
pub const ENTRY_FILE: &str = "index.js";

/// A named root inside the workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Drive {
    /// Compiled assets and copied static files.
    Statics,
    /// Server-rendered view templates.
    Views,
}

impl Drive {
    /// Both drives, statics first.
    pub const ALL: [Drive; 2] = [Drive::Statics, Drive::Views];

    /// Drive name as used on disk and in broker calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            Drive::Statics => "statics",
            Drive::Views => "views",
        }
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic workspace layout for a project root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Project root (where `rugopa.toml` lives).
    pub work_root: PathBuf,
    /// `<work_root>/.rugopa`.
    pub run_root: PathBuf,
    /// `<run_root>/statics`.
    pub static_dir: PathBuf,
    /// `<run_root>/views`.
    pub view_dir: PathBuf,
}

impl Workspace {
    /// Computes the layout without touching the filesystem.
    pub fn layout(work_root: impl Into<PathBuf>) -> Self {
        let work_root = work_root.into();
        let run_root = work_root.join(SPACE_ID);
        let static_dir = run_root.join(Drive::Statics.as_str());
        let view_dir = run_root.join(Drive::Views.as_str());

        Self {
            work_root,
            run_root,
            static_dir,
            view_dir,
        }
    }

    /// Computes the layout, deletes any previous run directory and recreates
    /// the run directory and both drives empty.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] when deletion or creation is denied. The
    /// error is not retried.
    pub fn prepare(work_root: impl Into<PathBuf>) -> Result<Self, WorkspaceError> {
        let workspace = Self::layout(work_root);
        workspace.reset()?;
        Ok(workspace)
    }

    /// Deletes and recreates the run directory and both drives.
    pub fn reset(&self) -> Result<(), WorkspaceError> {
        match fs::remove_dir_all(&self.run_root) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(WorkspaceError::new("remove", &self.run_root, e)),
        }

        for dir in [&self.run_root, &self.static_dir, &self.view_dir] {
            fs::create_dir_all(dir).map_err(|e| WorkspaceError::new("create", dir, e))?;
        }

        tracing::debug!("Workspace reset at {}", self.run_root.display());
        Ok(())
    }

    /// Directory backing a drive.
    pub fn drive_dir(&self, drive: Drive) -> &Path {
        match drive {
            Drive::Statics => &self.static_dir,
            Drive::Views => &self.view_dir,
        }
    }

    /// Path of the synthesized bundler entry file.
    pub fn entry_path(&self) -> PathBuf {
        self.run_root.join(ENTRY_FILE)
    }
}
