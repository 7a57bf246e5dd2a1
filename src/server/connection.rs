//! Per-connection worker
//!
//! Each accepted socket gets one worker: read a single request under a
//! deadline, dispatch it, write the full response, close. The one exception
//! is `GET /stream`, whose socket is handed to the hub and never sees a
//! terminal response.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::control::ControlEvent;
use crate::http::router::{self, Route, VIEWER_PAGE};
use crate::http::{read_request, response, Request};

use super::listener::Shared;

/// Uniform success envelope for control endpoints
const OK_BODY: &str = "{\"status\":\"ok\"}";

/// Drive one accepted connection to completion
pub(crate) async fn serve(shared: Arc<Shared>, conn_id: u64, mut stream: TcpStream) {
    let read = timeout(
        shared.config.read_timeout,
        read_request(&mut stream, shared.config.max_request_bytes),
    )
    .await;

    let request = match read {
        Ok(Ok(Some(request))) => request,
        Ok(Ok(None)) => {
            // Peer connected and went away without sending anything
            shared.registry.remove(conn_id);
            return;
        }
        Ok(Err(e)) => {
            tracing::debug!(conn_id = conn_id, error = %e, "Malformed request");
            // Parse failures get a 404, never a hung connection
            let _ = stream.write_all(&response::not_found()).await;
            let _ = stream.shutdown().await;
            shared.registry.remove(conn_id);
            return;
        }
        Err(_) => {
            tracing::debug!(conn_id = conn_id, "Request read timed out");
            shared.registry.remove(conn_id);
            return;
        }
    };

    let route = router::resolve(&request.method, &request.path);
    tracing::debug!(
        conn_id = conn_id,
        method = %request.method,
        path = %request.path,
        route = ?route,
        "Request"
    );

    if route == Route::Stream {
        // Ownership of the socket moves to the hub; the preamble is the
        // only thing written outside a publish pass.
        if let Err(e) = shared.hub.subscribe(conn_id, stream).await {
            tracing::debug!(conn_id = conn_id, error = %e, "Stream subscribe failed");
        }
        return;
    }

    let body = respond(&shared, &route, &request).await;
    if let Err(e) = stream.write_all(&body).await {
        tracing::debug!(conn_id = conn_id, error = %e, "Response write failed");
    }
    let _ = stream.flush().await;
    let _ = stream.shutdown().await;
    shared.registry.remove(conn_id);
}

/// Build the full response bytes for a non-streaming route
async fn respond(shared: &Shared, route: &Route, request: &Request) -> Vec<u8> {
    match route {
        Route::Index => response::html(VIEWER_PAGE),
        Route::Status => {
            let status = shared.status().await;
            let body = serde_json::to_string(&status)
                .unwrap_or_else(|_| OK_BODY.to_string());
            response::json(&body)
        }
        Route::SetResolution => {
            // A bad body degrades to "no event emitted, still ok"
            if let Some(label) = router::parse_resolution(&request.body) {
                shared.control.emit(ControlEvent::ChangeResolution(label));
            }
            response::json(OK_BODY)
        }
        Route::ToggleVideo => {
            shared.control.emit(ControlEvent::ToggleVideo);
            response::json(OK_BODY)
        }
        Route::ToggleAudio => {
            shared.control.emit(ControlEvent::ToggleAudio);
            response::json(OK_BODY)
        }
        Route::ToggleRecording => {
            shared.control.emit(ControlEvent::ToggleRecording);
            response::json(OK_BODY)
        }
        Route::NotFound => response::not_found(),
        // Handled by the caller before reaching here
        Route::Stream => response::not_found(),
    }
}
