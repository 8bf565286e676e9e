// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! File system watching for dev mode.
//!
//! This module provides `FileWatcher`, which monitors the source directory
//! and forwards changed paths to the build orchestrator.
//!
//! # Features
//!
//! - Short debounce (100ms) per raw event burst; the orchestrator does the
//!   real aggregation
//! - Glob ignore patterns from `[dev] ignore`
//! - Changes inside the run directory and the dist directory are dropped

use globset::{Glob, GlobSet, GlobSetBuilder};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, RecommendedCache};
use rugopa::orchestrator::ChangeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

const DEBOUNCE: Duration = Duration::from_millis(100);

/// Patterns ignored in every project.
const DEFAULT_IGNORES: [&str; 3] = ["**/.git/**", "**/node_modules/**", "**/*~"];

/// Decides which changed paths trigger a rebuild.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    base: PathBuf,
    excluded: Vec<PathBuf>,
    ignore: GlobSet,
}

impl ChangeFilter {
    /// Creates a filter for paths under `base`.
    ///
    /// `excluded` directories are dropped entirely. `ignore` globs are
    /// matched against paths relative to `base`.
    pub fn new(base: impl Into<PathBuf>, excluded: Vec<PathBuf>, ignore: &[String]) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in DEFAULT_IGNORES.iter().copied().chain(ignore.iter().map(String::as_str)) {
            builder.add(Glob::new(pattern)?);
        }

        Ok(Self {
            base: base.into(),
            excluded,
            ignore: builder.build()?,
        })
    }

    /// Returns true if a change to `path` should trigger a rebuild.
    pub fn accepts(&self, path: &Path) -> bool {
        if self.excluded.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }

        let relative = path.strip_prefix(&self.base).unwrap_or(path);
        !self.ignore.is_match(relative)
    }

    /// Keeps accepted paths, sorted and without duplicates.
    pub fn select<'a>(&self, paths: impl IntoIterator<Item = &'a PathBuf>) -> ChangeSet {
        let mut changed: ChangeSet = paths.into_iter().filter(|p| self.accepts(p)).cloned().collect();
        changed.sort();
        changed.dedup();
        changed
    }
}

/// Watches a directory tree and sends change sets to a channel.
///
/// Watching stops when the `FileWatcher` is dropped.
pub struct FileWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl FileWatcher {
    /// Starts watching `path` recursively.
    ///
    /// Every debounced burst of accepted changes is sent to `tx` as one
    /// change set. Send failures (orchestrator gone) are ignored.
    pub fn new(path: &Path, filter: ChangeFilter, tx: mpsc::UnboundedSender<ChangeSet>) -> anyhow::Result<Self> {
        let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| match result {
            Ok(events) => {
                let changed = filter.select(events.iter().flat_map(|e| e.paths.iter()));
                if !changed.is_empty() {
                    tracing::debug!("{} file(s) changed", changed.len());
                    let _ = tx.send(changed);
                }
            }
            Err(errors) => {
                for error in errors {
                    tracing::warn!("Watch error: {}", error);
                }
            }
        })?;

        debouncer.watch(path, RecursiveMode::Recursive)?;
        tracing::info!("Watching {}", path.display());

        Ok(Self { _debouncer: debouncer })
    }
}
