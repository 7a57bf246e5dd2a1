//! Live MJPEG fan-out hub
//!
//! The hub owns every `/stream` viewer socket. Each published frame is
//! serialized into one multipart part and written to all viewers in a single
//! locked pass; a viewer whose write fails or stalls past the deadline is
//! evicted in that same pass, so a stale subscriber can never receive a
//! later frame.
//!
//! ```text
//!                      Arc<StreamHub>
//!                 ┌──────────────────────┐
//!   publish(jpeg) │ viewers: Mutex<Map<  │
//!   ─────────────►│   conn_id -> TcpStream │
//!                 │ >>                   │
//!                 └───────┬──────┬───────┘
//!                 part    │      │    part
//!                         ▼      ▼
//!                    [Viewer]  [Viewer]
//! ```
//!
//! Subscribe, unsubscribe, and publish all serialize on one lock: a
//! concurrent subscribe is never lost, and removal during a publish pass is
//! atomic with that pass.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::error::Result;
use crate::http::response;
use crate::registry::ConnectionRegistry;

/// Boundary token separating multipart frames
///
/// Fixed for the lifetime of the process; must never occur inside JPEG data.
pub const STREAM_BOUNDARY: &str = "mjpegframe";

struct Viewer {
    stream: TcpStream,
}

/// Fan-out hub for live viewers
pub struct StreamHub {
    viewers: Mutex<HashMap<u64, Viewer>>,
    registry: Arc<ConnectionRegistry>,
    write_deadline: Duration,
    frames_published: AtomicU64,
}

impl StreamHub {
    /// Create a hub whose evictions are reflected in `registry`
    ///
    /// `write_deadline` bounds every socket write: a viewer that cannot
    /// accept a frame within it is treated as gone.
    pub fn new(registry: Arc<ConnectionRegistry>, write_deadline: Duration) -> Self {
        Self {
            viewers: Mutex::new(HashMap::new()),
            registry,
            write_deadline,
            frames_published: AtomicU64::new(0),
        }
    }

    /// Add a viewer, taking ownership of its socket
    ///
    /// Writes the multipart preamble first; if that write fails or stalls
    /// the viewer never joins and its registry entry is dropped. The hub
    /// starts delivering on the very next publish, even if the viewer set
    /// was empty before.
    pub async fn subscribe(&self, conn_id: u64, mut stream: TcpStream) -> Result<()> {
        let preamble = response::stream_preamble(STREAM_BOUNDARY);

        let write = timeout(self.write_deadline, stream.write_all(&preamble)).await;
        match write {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.registry.remove(conn_id);
                return Err(e.into());
            }
            Err(_) => {
                self.registry.remove(conn_id);
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "stream preamble write timed out",
                )
                .into());
            }
        }

        self.registry.mark_streaming(conn_id);

        let mut viewers = self.viewers.lock().await;
        viewers.insert(conn_id, Viewer { stream });
        tracing::info!(conn_id = conn_id, viewers = viewers.len(), "Viewer subscribed");

        Ok(())
    }

    /// Broadcast one JPEG frame to every viewer
    ///
    /// Returns the number of viewers the part was delivered to. Failed and
    /// stalled viewers are removed before this call returns. With no
    /// viewers this is a cheap no-op.
    pub async fn publish(&self, jpeg: &Bytes) -> usize {
        self.frames_published.fetch_add(1, Ordering::Relaxed);

        let mut viewers = self.viewers.lock().await;
        if viewers.is_empty() {
            return 0;
        }

        // One shared part buffer for the whole pass
        let part = encode_part(STREAM_BOUNDARY, jpeg);

        let mut failed: Vec<u64> = Vec::new();
        let mut delivered = 0usize;

        for (&id, viewer) in viewers.iter_mut() {
            match timeout(self.write_deadline, viewer.stream.write_all(&part)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    tracing::debug!(conn_id = id, error = %e, "Viewer write failed");
                    failed.push(id);
                }
                Err(_) => {
                    tracing::warn!(conn_id = id, "Viewer write stalled, evicting");
                    failed.push(id);
                }
            }
        }

        // Same-pass eviction: a failed viewer must not see a future frame
        for id in failed {
            if let Some(mut viewer) = viewers.remove(&id) {
                let _ = viewer.stream.shutdown().await;
            }
            self.registry.remove(id);
            tracing::info!(conn_id = id, viewers = viewers.len(), "Viewer evicted");
        }

        delivered
    }

    /// Remove one viewer and close its socket
    ///
    /// Idempotent: both the hub's own write-failure detection and external
    /// close notifications may call this for the same connection.
    pub async fn unsubscribe(&self, conn_id: u64) {
        let removed = self.viewers.lock().await.remove(&conn_id);
        if let Some(mut viewer) = removed {
            let _ = viewer.stream.shutdown().await;
            tracing::info!(conn_id = conn_id, "Viewer unsubscribed");
        }
        self.registry.remove(conn_id);
    }

    /// Force-close every viewer and clear the set
    ///
    /// Safe to call with zero viewers, and repeatedly.
    pub async fn shutdown(&self) {
        let drained: Vec<(u64, Viewer)> = self.viewers.lock().await.drain().collect();

        let count = drained.len();
        for (id, mut viewer) in drained {
            let _ = viewer.stream.shutdown().await;
            self.registry.remove(id);
        }

        if count > 0 {
            tracing::info!(viewers = count, "Hub shut down");
        }
    }

    /// Current number of live viewers
    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.len()
    }

    /// Total frames pushed through `publish` since startup
    pub fn frames_published(&self) -> u64 {
        self.frames_published.load(Ordering::Relaxed)
    }
}

/// Frame one JPEG buffer as a multipart part
///
/// `--B\r\nContent-Type: image/jpeg\r\nContent-Length: n\r\n\r\n<bytes>\r\n`
pub fn encode_part(boundary: &str, jpeg: &Bytes) -> Bytes {
    use std::fmt::Write;

    let mut buf = BytesMut::with_capacity(jpeg.len() + 128);
    write!(
        buf,
        "--{}\r\nContent-Type: image/jpeg\r\nContent-Length: {}\r\n\r\n",
        boundary,
        jpeg.len()
    )
    .expect("writing to BytesMut cannot fail");
    buf.put_slice(jpeg);
    buf.put_slice(b"\r\n");
    buf.freeze()
}
