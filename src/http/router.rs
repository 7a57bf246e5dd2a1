//! Request routing
//!
//! Maps method + path to an action. First match wins; the query string has
//! already been stripped by the parser. Anything unmatched is a 404,
//! whatever the method.

use serde::Deserialize;

/// The static viewer page served at `/`
pub const VIEWER_PAGE: &str = include_str!("viewer.html");

/// Where a request is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// `GET /` — static viewer HTML
    Index,
    /// `GET /stream` — hand the connection to the hub
    Stream,
    /// `GET /health` or `GET /status` — JSON status document
    Status,
    /// `POST /settings/resolution` — change-resolution control event
    SetResolution,
    /// `POST /settings/video` — toggle-video control event
    ToggleVideo,
    /// `POST /settings/audio` — toggle-audio control event
    ToggleAudio,
    /// `POST /settings/recording` — toggle-recording control event
    ToggleRecording,
    /// Everything else
    NotFound,
}

/// Resolve a parsed request to its route
pub fn resolve(method: &str, path: &str) -> Route {
    match (method, path) {
        ("GET", "/") => Route::Index,
        ("GET", "/stream") => Route::Stream,
        ("GET", "/health") | ("GET", "/status") => Route::Status,
        ("POST", "/settings/resolution") => Route::SetResolution,
        ("POST", "/settings/video") => Route::ToggleVideo,
        ("POST", "/settings/audio") => Route::ToggleAudio,
        ("POST", "/settings/recording") => Route::ToggleRecording,
        _ => Route::NotFound,
    }
}

#[derive(Deserialize)]
struct ResolutionBody {
    resolution: String,
}

/// Extract the resolution label from a control body
///
/// Non-UTF8, invalid JSON, or a missing field all yield `None`; the caller
/// still responds `{"status":"ok"}` — a bad body degrades to "no event
/// emitted", never an unresponsive connection. Labels are opaque strings;
/// unrecognized values are forwarded as-is.
pub fn parse_resolution(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ResolutionBody>(body)
        .ok()
        .map(|b| b.resolution)
}
