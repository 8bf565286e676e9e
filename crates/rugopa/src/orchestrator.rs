// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Build and watch orchestration.
//!
//! The orchestrator owns a [`Bundler`] and the [`BundlerConfig`] it compiles.
//! In build mode it runs a single pass. In watch mode it waits for change
//! triggers, collects everything that arrives within the aggregation window
//! into one compile, and never runs two compiles at once.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};

use crate::bundler::{BuildStats, Bundler, BundlerConfig};
use crate::error::CompileError;

/// Default window collecting file changes into one rebuild.
pub const DEFAULT_AGGREGATE_TIMEOUT: Duration = Duration::from_millis(300);

/// Lifecycle of the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    /// Waiting for a trigger.
    Idle,
    /// A compile is running.
    Compiling,
    /// The last compile succeeded.
    Succeeded,
    /// The last compile failed.
    Failed,
    /// No further compiles will run.
    Terminated,
}

/// A batch of changed paths reported by the file watcher.
pub type ChangeSet = Vec<PathBuf>;

/// Drives a bundler through single builds or a watch loop.
pub struct Orchestrator {
    bundler: Arc<dyn Bundler>,
    config: BundlerConfig,
    aggregate_timeout: Duration,
    state: watch::Sender<BuildState>,
}

impl Orchestrator {
    /// Creates an orchestrator in the [`BuildState::Idle`] state.
    pub fn new(bundler: Arc<dyn Bundler>, config: BundlerConfig) -> Self {
        let (state, _) = watch::channel(BuildState::Idle);
        Self {
            bundler,
            config,
            aggregate_timeout: DEFAULT_AGGREGATE_TIMEOUT,
            state,
        }
    }

    /// Sets the aggregation window used in watch mode.
    pub fn with_aggregate_timeout(mut self, timeout: Duration) -> Self {
        self.aggregate_timeout = timeout;
        self
    }

    /// Current state.
    pub fn state(&self) -> BuildState {
        *self.state.borrow()
    }

    /// Subscribes to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<BuildState> {
        self.state.subscribe()
    }

    /// Runs one compile and terminates.
    ///
    /// # Errors
    ///
    /// Returns the bundler's [`CompileError`]; the state is
    /// [`BuildState::Terminated`] either way.
    pub async fn build_once(&self) -> Result<BuildStats, CompileError> {
        let result = self.compile().await;
        self.state.send_replace(BuildState::Terminated);
        result
    }

    /// Compiles once, then recompiles for every batch of triggers until the
    /// trigger channel closes.
    ///
    /// `on_rebuild` runs exactly once per successful compile, including the
    /// initial one. Failed compiles are logged and skipped.
    pub async fn watch<F>(&self, mut triggers: mpsc::UnboundedReceiver<ChangeSet>, mut on_rebuild: F)
    where
        F: FnMut(&BuildStats) + Send,
    {
        self.cycle(&mut on_rebuild).await;

        while let Some(first) = triggers.recv().await {
            let mut changed = first;

            tokio::time::sleep(self.aggregate_timeout).await;
            while let Ok(more) = triggers.try_recv() {
                changed.extend(more);
            }
            changed.sort();
            changed.dedup();

            tracing::info!("Rebuilding after {} change(s)", changed.len());
            for path in &changed {
                tracing::debug!("  changed: {}", path.display());
            }

            self.cycle(&mut on_rebuild).await;
        }

        self.state.send_replace(BuildState::Terminated);
        tracing::debug!("Trigger channel closed, watch loop finished");
    }

    async fn cycle<F>(&self, on_rebuild: &mut F)
    where
        F: FnMut(&BuildStats) + Send,
    {
        match self.compile().await {
            Ok(stats) => {
                on_rebuild(&stats);
                self.state.send_replace(BuildState::Idle);
            }
            Err(e) => {
                tracing::error!("Build failed: {}", e);
                self.state.send_replace(BuildState::Idle);
            }
        }
    }

    async fn compile(&self) -> Result<BuildStats, CompileError> {
        self.state.send_replace(BuildState::Compiling);
        tracing::debug!("Running {} ({})", self.bundler.name(), self.config.mode.as_str());

        let start = Instant::now();
        let result = self.bundler.run(&self.config).await;

        match &result {
            Ok(stats) => {
                tracing::info!(
                    "{} finished in {}ms with {} output(s)",
                    self.bundler.name(),
                    start.elapsed().as_millis(),
                    stats.outputs.len()
                );
                for warning in &stats.warnings {
                    tracing::warn!("{}", warning);
                }
                self.state.send_replace(BuildState::Succeeded);
            }
            Err(_) => {
                self.state.send_replace(BuildState::Failed);
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::{BuildMode, BundlerConfigBuilder};
    use crate::config::ProjectConfig;
    use crate::workspace::Workspace;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeBundler {
        runs: AtomicUsize,
        active: AtomicUsize,
        max_active: AtomicUsize,
        delay: Duration,
        failures: Mutex<VecDeque<bool>>,
    }

    impl FakeBundler {
        fn new(delay: Duration, outcomes: &[bool]) -> Arc<Self> {
            Arc::new(Self {
                runs: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                delay,
                failures: Mutex::new(outcomes.iter().map(|ok| !ok).collect()),
            })
        }
    }

    #[async_trait]
    impl Bundler for FakeBundler {
        fn name(&self) -> &str {
            "fake"
        }

        async fn run(&self, _config: &BundlerConfig) -> Result<BuildStats, CompileError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(active, Ordering::SeqCst);

            tokio::time::sleep(self.delay).await;

            self.active.fetch_sub(1, Ordering::SeqCst);
            let fail = self.failures.lock().unwrap().pop_front().unwrap_or(false);
            if fail {
                Err(CompileError::Failed {
                    code: Some(2),
                    output: "Module not found".to_string(),
                })
            } else {
                Ok(BuildStats::default())
            }
        }
    }

    fn config() -> BundlerConfig {
        let project = ProjectConfig::from_toml("").unwrap();
        let ws = Workspace::layout("/project");
        BundlerConfigBuilder::new(&project, &ws, BuildMode::Development)
            .build()
            .unwrap()
    }

    fn counter() -> (Arc<AtomicUsize>, impl FnMut(&BuildStats) + Send) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move |_: &BuildStats| {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_build_once_terminates() {
        let bundler = FakeBundler::new(Duration::ZERO, &[true]);
        let orchestrator = Orchestrator::new(bundler.clone(), config());

        assert_eq!(orchestrator.state(), BuildState::Idle);
        orchestrator.build_once().await.unwrap();
        assert_eq!(orchestrator.state(), BuildState::Terminated);
        assert_eq!(bundler.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_build_once_reports_failure() {
        let bundler = FakeBundler::new(Duration::ZERO, &[false]);
        let orchestrator = Orchestrator::new(bundler, config());

        let err = orchestrator.build_once().await.unwrap_err();
        assert!(err.to_string().contains("exit code 2"));
        assert_eq!(orchestrator.state(), BuildState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_queued_triggers_coalesce_into_one_compile() {
        let bundler = FakeBundler::new(Duration::from_millis(50), &[]);
        let orchestrator = Orchestrator::new(bundler.clone(), config());
        let (notified, on_rebuild) = counter();

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(vec![PathBuf::from("src/a.css")]).unwrap();
        tx.send(vec![PathBuf::from("src/b.css")]).unwrap();
        tx.send(vec![PathBuf::from("src/a.css")]).unwrap();
        drop(tx);

        orchestrator.watch(rx, on_rebuild).await;

        // initial compile plus one for the whole batch
        assert_eq!(bundler.runs.load(Ordering::SeqCst), 2);
        assert_eq!(notified.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.state(), BuildState::Terminated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compiles_never_overlap() {
        let bundler = FakeBundler::new(Duration::from_secs(1), &[]);
        let orchestrator = Arc::new(Orchestrator::new(bundler.clone(), config()));
        let (notified, on_rebuild) = counter();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.watch(rx, on_rebuild).await })
        };

        tx.send(vec![PathBuf::from("src/a.css")]).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        // the batch compile is running; these wait for the next cycle
        tx.send(vec![PathBuf::from("src/b.css")]).unwrap();
        tx.send(vec![PathBuf::from("src/c.css")]).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        drop(tx);

        task.await.unwrap();
        assert_eq!(bundler.runs.load(Ordering::SeqCst), 3);
        assert_eq!(bundler.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(notified.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_compile_does_not_notify() {
        let bundler = FakeBundler::new(Duration::from_millis(10), &[true, false, true]);
        let orchestrator = Arc::new(Orchestrator::new(bundler.clone(), config()));
        let (notified, on_rebuild) = counter();
        let mut states = orchestrator.subscribe();

        let (tx, rx) = mpsc::unbounded_channel();
        let task = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.watch(rx, on_rebuild).await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);

        tx.send(vec![PathBuf::from("src/broken.css")]).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notified.load(Ordering::SeqCst), 1);
        assert_eq!(*states.borrow_and_update(), BuildState::Idle);

        tx.send(vec![PathBuf::from("src/fixed.css")]).unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(notified.load(Ordering::SeqCst), 2);

        drop(tx);
        task.await.unwrap();
        assert_eq!(bundler.runs.load(Ordering::SeqCst), 3);
        assert_eq!(*states.borrow(), BuildState::Terminated);
    }
}
