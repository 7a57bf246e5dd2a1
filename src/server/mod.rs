//! HTTP server: listener, per-connection workers, configuration

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use listener::StreamServer;
