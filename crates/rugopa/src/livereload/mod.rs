// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Live-reload client registry.
//!
//! Every connected browser is represented by a [`DebouncedSender`] feeding
//! the writer task of its WebSocket. Messages scheduled on the same client
//! within the debounce window collapse into the last one. The transport
//! lives in the CLI; this module only tracks clients and timing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Greeting written to every new connection.
pub const CONNECTED: &str = "connected";

/// Message broadcast after each successful rebuild.
pub const RELOAD: &str = "reload";

/// Default per-client send debounce window.
pub const DEFAULT_SEND_DEBOUNCE: Duration = Duration::from_millis(100);

const PORT_PLACEHOLDER: &str = "__RUGOPA_LIVERELOAD_PORT__";

/// Browser-side script appended to the bundle entry in development mode.
pub fn client_snippet(port: u16) -> String {
    include_str!("inject.js").replace(PORT_PLACEHOLDER, &port.to_string())
}

/// Identifier of a registered connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

/// Per-connection trailing-edge debouncer.
///
/// Each [`schedule_send`](Self::schedule_send) cancels the pending message
/// and schedules the new one after the wait. Delivery to a closed
/// connection is dropped silently.
pub struct DebouncedSender {
    tx: mpsc::UnboundedSender<String>,
    wait: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DebouncedSender {
    /// Wraps the channel feeding a connection's writer task.
    pub fn new(tx: mpsc::UnboundedSender<String>, wait: Duration) -> Self {
        Self {
            tx,
            wait,
            pending: Mutex::new(None),
        }
    }

    /// Schedules `message`, replacing any message still waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule_send(&self, message: impl Into<String>) {
        let message = message.into();
        let tx = self.tx.clone();
        let wait = self.wait;

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }

        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            // The writer may be gone already
            let _ = tx.send(message);
        }));
    }

    /// Returns true once the connection's writer has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Drop for DebouncedSender {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = pending.take() {
            handle.abort();
        }
    }
}

/// Set of live-reload connections.
pub struct ClientRegistry {
    next_id: AtomicU64,
    wait: Duration,
    clients: Mutex<HashMap<ClientId, DebouncedSender>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_DEBOUNCE)
    }
}

impl ClientRegistry {
    /// Creates an empty registry whose clients debounce by `wait`.
    pub fn new(wait: Duration) -> Self {
        Self {
            next_id: AtomicU64::new(1),
            wait,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a connection fed through `tx`.
    pub fn add(&self, tx: mpsc::UnboundedSender<String>) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().insert(id, DebouncedSender::new(tx, self.wait));
        tracing::debug!("Live-reload client {:?} registered", id);
        id
    }

    /// Forgets a connection. Unknown ids are ignored.
    pub fn remove(&self, id: ClientId) {
        if self.lock().remove(&id).is_some() {
            tracing::debug!("Live-reload client {:?} removed", id);
        }
    }

    /// Schedules `message` on every open connection and drops closed ones.
    ///
    /// Returns the number of connections the message was scheduled on.
    pub fn broadcast(&self, message: &str) -> usize {
        let mut clients = self.lock();
        clients.retain(|_, sender| !sender.is_closed());

        for sender in clients.values() {
            sender.schedule_send(message);
        }

        clients.len()
    }

    /// Number of registered connections.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClientId, DebouncedSender>> {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_snippet_targets_port() {
        let snippet = client_snippet(4123);

        assert!(snippet.contains(":4123/__livereload"));
        assert!(snippet.contains("location.reload()"));
        assert!(!snippet.contains(PORT_PLACEHOLDER));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_sends_collapse_to_last() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = DebouncedSender::new(tx, Duration::from_millis(100));

        sender.schedule_send("first");
        tokio::time::sleep(Duration::from_millis(30)).await;
        sender.schedule_send("second");
        tokio::time::sleep(Duration::from_millis(30)).await;
        sender.schedule_send(RELOAD);

        tokio::time::sleep(Duration::from_millis(99)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(rx.try_recv().unwrap(), RELOAD);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_outside_window_are_delivered() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sender = DebouncedSender::new(tx, Duration::from_millis(100));

        sender.schedule_send(RELOAD);
        tokio::time::sleep(Duration::from_millis(150)).await;
        sender.schedule_send(RELOAD);
        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(rx.recv().await.unwrap(), RELOAD);
        assert_eq!(rx.recv().await.unwrap(), RELOAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broadcast_skips_closed_clients() {
        let registry = ClientRegistry::new(Duration::from_millis(100));

        let (open_tx, mut open_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = mpsc::unbounded_channel::<String>();
        registry.add(open_tx);
        registry.add(closed_tx);
        drop(closed_rx);
        assert_eq!(registry.len(), 2);

        assert_eq!(registry.broadcast(RELOAD), 1);
        assert_eq!(registry.len(), 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(open_rx.recv().await.unwrap(), RELOAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_client_receives_nothing() {
        let registry = ClientRegistry::default();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.add(tx);

        registry.broadcast(RELOAD);
        registry.remove(id);
        registry.remove(id);
        assert!(registry.is_empty());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.recv().await.is_none());
    }
}
