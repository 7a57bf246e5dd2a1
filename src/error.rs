//! Crate-wide error types
//!
//! Only `Error::Bind` ever reaches the caller of [`StreamServer::start`];
//! every other variant is handled where it occurs (connection removed, frame
//! dropped, recording stopped).
//!
//! [`StreamServer::start`]: crate::server::StreamServer::start

use std::net::SocketAddr;
use std::path::PathBuf;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for server operations
#[derive(Debug)]
pub enum Error {
    /// Failed to bind the listen address (port in use, permission denied).
    /// Terminal for that start attempt; the server stays stopped.
    Bind {
        /// Address the bind was attempted on
        addr: SocketAddr,
        /// Underlying socket error
        source: std::io::Error,
    },

    /// General socket I/O failure
    Io(std::io::Error),

    /// Malformed HTTP request
    InvalidRequest(String),

    /// A frame could not be encoded into its container
    Encode(String),

    /// Disk error while writing a segment or playlist
    SegmentIo {
        /// Path being written when the error occurred
        path: PathBuf,
        /// Underlying filesystem error
        source: std::io::Error,
    },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Bind { addr, source } => write!(f, "failed to bind {}: {}", addr, source),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::InvalidRequest(msg) => write!(f, "invalid request: {}", msg),
            Error::Encode(msg) => write!(f, "encode error: {}", msg),
            Error::SegmentIo { path, source } => {
                write!(f, "segment I/O error at {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Bind { source, .. } => Some(source),
            Error::Io(e) => Some(e),
            Error::SegmentIo { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}
