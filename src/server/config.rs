//! Server configuration

use std::net::SocketAddr;
use std::time::Duration;

use crate::recorder::RecorderConfig;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// How long a connection may take to deliver its request
    pub read_timeout: Duration,

    /// Per-viewer write deadline; a stalled write past this evicts the
    /// viewer instead of stalling the broadcast
    pub write_deadline: Duration,

    /// Upper bound on request head + body size
    pub max_request_bytes: usize,

    /// Recording pipeline settings
    pub recording: RecorderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Important for low latency
            read_timeout: Duration::from_secs(10),
            write_deadline: Duration::from_secs(5),
            max_request_bytes: 64 * 1024,
            recording: RecorderConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the request read timeout
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the per-viewer write deadline
    pub fn write_deadline(mut self, deadline: Duration) -> Self {
        self.write_deadline = deadline;
        self
    }

    /// Set the recording pipeline configuration
    pub fn recording(mut self, recording: RecorderConfig) -> Self {
        self.recording = recording;
        self
    }
}
