//! Per-connection identity and the per-listener count of open connections.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::observability::metrics;

static NEXT_CONNECTION: AtomicU64 = AtomicU64::new(1);

/// Process-wide unique id, used only to correlate log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Debug)]
struct Counter {
    listener: Arc<str>,
    open: AtomicU64,
}

impl Counter {
    fn adjust(&self, opened: bool) {
        let now = if opened {
            self.open.fetch_add(1, Ordering::AcqRel) + 1
        } else {
            self.open.fetch_sub(1, Ordering::AcqRel) - 1
        };
        metrics::record_active_connections(&self.listener, now);
    }
}

/// Counts connections a listener has accepted and not yet finished.
///
/// Clones share the same count.
#[derive(Debug, Clone)]
pub struct ConnectionTracker(Arc<Counter>);

impl ConnectionTracker {
    pub fn new(listener: impl Into<Arc<str>>) -> Self {
        Self(Arc::new(Counter {
            listener: listener.into(),
            open: AtomicU64::new(0),
        }))
    }

    /// Count a freshly accepted connection until the guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.0.adjust(true);
        ConnectionGuard {
            counter: Arc::clone(&self.0),
            id: ConnectionId::new(),
        }
    }

    pub fn active_count(&self) -> u64 {
        self.0.open.load(Ordering::Acquire)
    }
}

/// One open connection. Travels with the task that serves it.
#[derive(Debug)]
pub struct ConnectionGuard {
    counter: Arc<Counter>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.counter.adjust(false);
        tracing::trace!(connection_id = %self.id, listener = %self.counter.listener, "Connection finished");
    }
}
