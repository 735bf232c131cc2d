//! Connection lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Count active connections for graceful shutdown
//! - Tell idle connections to close once draining starts

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::observability::metrics;

/// Using relaxed ordering is sufficient since we only need uniqueness.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks active connections for graceful shutdown.
///
/// The watch channel flips to `true` when the server starts draining.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
    draining_tx: Arc<watch::Sender<bool>>,
    draining_rx: watch::Receiver<bool>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            active_count: Arc::new(AtomicU64::new(0)),
            draining_tx: Arc::new(tx),
            draining_rx: rx,
        }
    }

    /// Record a new active connection. Returns a guard that decrements on drop.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_active_connections(active);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Get current active connection count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Signal every connection that no new requests should start.
    pub fn start_draining(&self) {
        let _ = self.draining_tx.send(true);
    }

    /// Receiver observed by connections between requests.
    pub fn draining(&self) -> watch::Receiver<bool> {
        self.draining_rx.clone()
    }

    /// Wait until all connections are closed.
    pub async fn wait_for_idle(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that tracks a connection's lifetime.
/// Decrements active count when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_active_connections(active);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}
