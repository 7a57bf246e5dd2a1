//! Server listener
//!
//! Handles the TCP accept loop, spawns connection workers, and owns
//! start/stop lifecycle. `stop` does not return until the accept loop has
//! exited and the port is released, so stop-then-start on the same address
//! cannot race the bind.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

use crate::control::{self, ControlReceiver, ControlSender};
use crate::error::{Error, Result};
use crate::hub::StreamHub;
use crate::media::MediaFrame;
use crate::recorder::SegmentWriter;
use crate::registry::ConnectionRegistry;
use crate::server::config::ServerConfig;
use crate::server::connection;
use crate::stats::ServerStatus;

/// State shared between the server handle, the accept loop, and every
/// connection worker
pub(crate) struct Shared {
    pub config: ServerConfig,
    pub hub: StreamHub,
    pub registry: Arc<ConnectionRegistry>,
    pub recorder: SegmentWriter,
    pub control: ControlSender,
    pub started_at: Instant,
}

impl Shared {
    /// Snapshot for `/health` and `/status`
    pub async fn status(&self) -> ServerStatus {
        ServerStatus {
            status: "ok".to_string(),
            viewers: self.hub.viewer_count().await,
            connections: self.registry.len(),
            recording: self.recorder.is_recording(),
            frames_published: self.hub.frames_published(),
            uptime_secs: self.started_at.elapsed().as_secs(),
        }
    }
}

/// A running listener instance
struct Running {
    shutdown_tx: watch::Sender<bool>,
    accept_task: JoinHandle<()>,
    local_addr: SocketAddr,
}

/// MJPEG streaming server
///
/// Owns the listener lifecycle, the viewer hub, the connection registry,
/// and the recording pipeline. Frames from the external source enter
/// through [`ingest`](StreamServer::ingest); control commands flow out
/// through the [`ControlReceiver`] returned by [`new`](StreamServer::new).
pub struct StreamServer {
    shared: Arc<Shared>,
    state: Mutex<Option<Running>>,
}

impl StreamServer {
    /// Create a server and the receiving end of its control events
    pub fn new(config: ServerConfig) -> (Self, ControlReceiver) {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = StreamHub::new(Arc::clone(&registry), config.write_deadline);
        let recorder = SegmentWriter::new(config.recording.clone());
        let (control, control_rx) = control::channel();

        let shared = Arc::new(Shared {
            config,
            hub,
            registry,
            recorder,
            control,
            started_at: Instant::now(),
        });

        (
            Self {
                shared,
                state: Mutex::new(None),
            },
            control_rx,
        )
    }

    /// Bind the configured address and start accepting connections
    ///
    /// Returns the bound address. A bind failure (port in use) is terminal
    /// for this attempt and leaves the server stopped. Calling `start` on a
    /// server that is already running returns the existing address.
    pub async fn start(&self) -> Result<SocketAddr> {
        let mut state = self.state.lock().await;
        if let Some(running) = state.as_ref() {
            return Ok(running.local_addr);
        }

        let addr = self.shared.config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shared = Arc::clone(&self.shared);
        let accept_task = tokio::spawn(accept_loop(shared, listener, shutdown_rx));

        tracing::info!(addr = %local_addr, "MJPEG server listening");

        *state = Some(Running {
            shutdown_tx,
            accept_task,
            local_addr,
        });
        Ok(local_addr)
    }

    /// Stop the server and release every resource
    ///
    /// Stops the accept loop (awaiting its exit, so the port is free when
    /// this returns), force-closes all tracked connections, clears the hub,
    /// and finalizes any in-progress recording. Idempotent; safe to call
    /// when nothing is running.
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;

        if let Some(running) = state.take() {
            let _ = running.shutdown_tx.send(true);
            if running.accept_task.await.is_err() {
                tracing::warn!("Accept loop terminated abnormally");
            }
            tracing::info!(addr = %running.local_addr, "Server stopped");
        }

        self.shared.registry.close_all();
        self.shared.hub.shutdown().await;
        if let Err(e) = self.shared.recorder.stop() {
            tracing::error!(error = %e, "Recorder finalize failed during stop");
        }
    }

    /// Push one frame from the external source through the pipeline
    ///
    /// Video frames fan out to live viewers and, while recording, into the
    /// segment writer; audio frames feed the writer only. Per-frame errors
    /// are consumed here — the producer is never stalled or failed.
    pub async fn ingest(&self, frame: MediaFrame) {
        if frame.is_video() {
            self.shared.hub.publish(&frame.data).await;
        }

        if let Err(e) = self.shared.recorder.write_frame(&frame) {
            tracing::warn!(error = %e, "Frame not recorded");
        }
    }

    /// The live viewer hub
    pub fn hub(&self) -> &StreamHub {
        &self.shared.hub
    }

    /// The connection registry
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.shared.registry
    }

    /// The recording pipeline
    ///
    /// The embedding application flips recording on/off in response to the
    /// toggle-recording control event; the server itself never does.
    pub fn recorder(&self) -> &SegmentWriter {
        &self.shared.recorder
    }

    /// Current status snapshot
    pub async fn status(&self) -> ServerStatus {
        self.shared.status().await
    }

    /// Bound address of the running listener, if any
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.state.lock().await.as_ref().map(|r| r.local_addr)
    }
}

/// Accept connections until shut down
async fn accept_loop(shared: Arc<Shared>, listener: TcpListener, mut shutdown: watch::Receiver<bool>) {
    let semaphore = if shared.config.max_connections > 0 {
        Some(Arc::new(Semaphore::new(shared.config.max_connections)))
    } else {
        None
    };

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::debug!("Accept loop shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((socket, peer_addr)) => {
                    handle_connection(&shared, &semaphore, socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
    // Listener drops here; the port is released before the task completes
}

fn handle_connection(
    shared: &Arc<Shared>,
    semaphore: &Option<Arc<Semaphore>>,
    socket: TcpStream,
    peer_addr: SocketAddr,
) {
    // Check connection limit
    let permit = if let Some(sem) = semaphore {
        match Arc::clone(sem).try_acquire_owned() {
            Ok(permit) => Some(permit),
            Err(_) => {
                tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                return;
            }
        }
    } else {
        None
    };

    if shared.config.tcp_nodelay {
        if let Err(e) = socket.set_nodelay(true) {
            tracing::debug!(error = %e, "Failed to set TCP_NODELAY");
        }
    }

    let conn_id = shared.registry.register(peer_addr);
    tracing::debug!(conn_id = conn_id, peer = %peer_addr, "New connection");

    let worker_shared = Arc::clone(shared);
    let task = tokio::spawn(async move {
        connection::serve(worker_shared, conn_id, socket).await;
        drop(permit);
    });
    shared.registry.attach_task(conn_id, task);
}
