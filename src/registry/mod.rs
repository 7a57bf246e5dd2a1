//! Connection registry
//!
//! Tracks every accepted socket so a global stop can force-close all of
//! them, even mid-request, and so the server can tell short-lived
//! request/response connections apart from hub-owned streaming ones.

pub mod store;

pub use store::{ConnectionKind, ConnectionRegistry};
