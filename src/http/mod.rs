//! Hand-rolled HTTP/1.1 subset over raw TCP
//!
//! Only what the wire protocol needs: permissive request parsing (unknown
//! headers ignored, query strings tolerated), fixed-length responses with
//! `Connection: close`, and the one unbounded response type — the
//! `multipart/x-mixed-replace` stream preamble.

pub mod request;
pub mod response;
pub mod router;

pub use request::{read_request, Request};
pub use router::Route;
