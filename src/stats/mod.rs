//! Server status snapshot
//!
//! Served as the JSON body of `GET /health` and `GET /status`.

use serde::{Deserialize, Serialize};

/// Point-in-time view of the server, safe to hand to any client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    /// Always `"ok"` when the server is answering at all
    pub status: String,

    /// Viewers currently attached to the live stream
    pub viewers: usize,

    /// All tracked connections, transient ones included
    pub connections: usize,

    /// Whether a recording session is active
    pub recording: bool,

    /// Frames pushed through the hub since startup
    pub frames_published: u64,

    /// Seconds since the server instance was created
    pub uptime_secs: u64,
}
