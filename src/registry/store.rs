//! Connection registry implementation
//!
//! Connections are keyed by a stable id allocated at accept time — never by
//! socket identity. Removal is idempotent because any of three paths may
//! detect a terminal state first: the worker finishing its response, the
//! hub's write-failure eviction, or a global stop.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tokio::task::JoinHandle;

/// How a tracked connection is being used
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// One request/response pair, closed after the write
    Transient,
    /// Hub-owned `/stream` connection, open until it errors or the hub
    /// shuts down
    Streaming,
}

struct ConnectionEntry {
    kind: ConnectionKind,
    peer_addr: SocketAddr,
    /// Worker task for the connection; aborting it drops the socket and
    /// wakes any blocked read. Streaming connections outlive their worker,
    /// so their abort is a no-op and teardown goes through the hub instead.
    task: Option<JoinHandle<()>>,
}

/// Registry of every open connection
///
/// Guarded by a `std::sync::Mutex`: no await happens under the lock.
pub struct ConnectionRegistry {
    connections: Mutex<HashMap<u64, ConnectionEntry>>,
    next_id: AtomicU64,
}

impl ConnectionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Track a newly accepted socket, returning its connection id
    ///
    /// Connections start as [`ConnectionKind::Transient`]; the hub upgrades
    /// the ones it takes ownership of.
    pub fn register(&self, peer_addr: SocketAddr) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut connections = self.connections.lock().unwrap();
        connections.insert(
            id,
            ConnectionEntry {
                kind: ConnectionKind::Transient,
                peer_addr,
                task: None,
            },
        );

        tracing::debug!(conn_id = id, peer = %peer_addr, "Connection registered");
        id
    }

    /// Attach the worker task handling this connection
    pub fn attach_task(&self, id: u64, task: JoinHandle<()>) {
        let mut connections = self.connections.lock().unwrap();
        if let Some(entry) = connections.get_mut(&id) {
            entry.task = Some(task);
        } else {
            // Worker already finished and removed itself before the
            // listener could attach the handle
            task.abort();
        }
    }

    /// Mark a connection as hub-owned
    pub fn mark_streaming(&self, id: u64) {
        let mut connections = self.connections.lock().unwrap();
        if let Some(entry) = connections.get_mut(&id) {
            entry.kind = ConnectionKind::Streaming;
        }
    }

    /// Stop tracking a connection
    ///
    /// Safe to call repeatedly for the same id; returns whether the entry
    /// was still present.
    pub fn remove(&self, id: u64) -> bool {
        let removed = self.connections.lock().unwrap().remove(&id);
        if let Some(entry) = &removed {
            tracing::debug!(conn_id = id, peer = %entry.peer_addr, "Connection removed");
        }
        removed.is_some()
    }

    /// Force-close every tracked connection
    ///
    /// Aborts each worker task (dropping its socket, waking blocked reads)
    /// and clears the map. Streaming sockets live inside the hub and are
    /// closed by the hub's own shutdown. Safe to call with nothing tracked.
    pub fn close_all(&self) {
        let entries: Vec<(u64, ConnectionEntry)> =
            self.connections.lock().unwrap().drain().collect();

        let count = entries.len();
        for (_, entry) in entries {
            if let Some(task) = entry.task {
                task.abort();
            }
        }

        if count > 0 {
            tracing::info!(connections = count, "All connections force-closed");
        }
    }

    /// Number of tracked connections
    pub fn len(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Whether nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of tracked connections of the given kind
    pub fn count_kind(&self, kind: ConnectionKind) -> usize {
        self.connections
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.kind == kind)
            .count()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
