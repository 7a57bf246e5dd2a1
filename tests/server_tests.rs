//! End-to-end tests over real TCP sockets

use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::error::TryRecvError;
use tokio_test::assert_ok;

use mjpeg_hub::{
    ControlEvent, ControlReceiver, MediaFrame, RecorderConfig, ServerConfig, StreamServer,
    STREAM_BOUNDARY,
};

fn local_config() -> ServerConfig {
    ServerConfig::with_addr("127.0.0.1:0".parse().unwrap())
}

async fn start_server(config: ServerConfig) -> (StreamServer, ControlReceiver, std::net::SocketAddr) {
    let (server, control) = StreamServer::new(config);
    let addr = server.start().await.expect("server should bind");
    (server, control, addr)
}

/// Send one raw request and read the whole response until EOF
async fn send_request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    String::from_utf8_lossy(&response).into_owned()
}

fn get(path: &str) -> String {
    format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path)
}

fn post(path: &str, body: &str) -> String {
    format!(
        "POST {} HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{}",
        path,
        body.len(),
        body
    )
}

#[tokio::test]
async fn index_serves_viewer_page() {
    let (server, _control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &get("/")).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("Content-Type: text/html"));
    assert!(response.contains("<html"));

    server.stop().await;
}

#[tokio::test]
async fn unknown_path_returns_404() {
    let (server, _control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &get("/bogus")).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("Content-Length: 0\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn malformed_request_gets_404_not_a_hang() {
    let (server, _control, addr) = start_server(local_config()).await;

    let response = send_request(addr, "garbage\r\n\r\n").await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));

    server.stop().await;
}

#[tokio::test]
async fn query_string_is_ignored_for_routing() {
    let (server, _control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &get("/status?verbose=1")).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.contains("application/json"));

    server.stop().await;
}

#[tokio::test]
async fn toggle_video_emits_exactly_one_event() {
    let (server, mut control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &post("/settings/video", "")).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("{\"status\":\"ok\"}"));
    assert!(response.contains("Access-Control-Allow-Origin: *\r\n"));

    assert_eq!(control.recv().await, Some(ControlEvent::ToggleVideo));
    assert!(matches!(control.try_recv(), Err(TryRecvError::Empty)));

    server.stop().await;
}

#[tokio::test]
async fn audio_and_recording_toggles_emit_events() {
    let (server, mut control, addr) = start_server(local_config()).await;

    send_request(addr, &post("/settings/audio", "")).await;
    send_request(addr, &post("/settings/recording", "")).await;

    assert_eq!(control.recv().await, Some(ControlEvent::ToggleAudio));
    assert_eq!(control.recv().await, Some(ControlEvent::ToggleRecording));

    server.stop().await;
}

#[tokio::test]
async fn resolution_change_carries_label() {
    let (server, mut control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &post("/settings/resolution", "{\"resolution\": \"1080p\"}")).await;
    assert!(response.ends_with("{\"status\":\"ok\"}"));
    assert_eq!(
        control.recv().await,
        Some(ControlEvent::ChangeResolution("1080p".into()))
    );

    server.stop().await;
}

#[tokio::test]
async fn bad_resolution_body_still_ok_but_no_event() {
    let (server, mut control, addr) = start_server(local_config()).await;

    let response = send_request(addr, &post("/settings/resolution", "not json at all")).await;
    assert!(response.ends_with("{\"status\":\"ok\"}"));
    assert!(matches!(control.try_recv(), Err(TryRecvError::Empty)));

    server.stop().await;
}

#[tokio::test]
async fn status_round_trips_as_json() {
    let (server, _control, addr) = start_server(local_config()).await;

    for path in ["/status", "/health"] {
        let response = send_request(addr, &get(path)).await;
        let body_start = response.find("\r\n\r\n").unwrap() + 4;
        let value: serde_json::Value = serde_json::from_str(&response[body_start..]).unwrap();

        assert_eq!(value["status"], "ok");
        assert_eq!(value["viewers"], 0);
        assert_eq!(value["recording"], false);
    }

    server.stop().await;
}

/// Connect a `/stream` viewer and consume the preamble
async fn connect_viewer(addr: std::net::SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(get("/stream").as_bytes()).await.unwrap();

    let mut buf = vec![0u8; 1024];
    let n = stream.read(&mut buf).await.unwrap();
    let preamble = String::from_utf8_lossy(&buf[..n]).into_owned();
    assert!(preamble.starts_with("HTTP/1.1 200 OK\r\n"), "got: {preamble}");
    assert!(preamble.contains("multipart/x-mixed-replace"));
    stream
}

#[tokio::test]
async fn stream_delivers_published_frames() {
    let (server, _control, addr) = start_server(local_config()).await;

    let mut viewer = connect_viewer(addr).await;

    // Subscription lands asynchronously; wait for the hub to own it
    for _ in 0..100 {
        if server.hub().viewer_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.hub().viewer_count().await, 1);

    let jpeg = Bytes::from_static(b"\xFF\xD8fake-jpeg-payload\xFF\xD9");
    server
        .ingest(MediaFrame::video(Duration::from_millis(0), jpeg.clone()))
        .await;
    server
        .ingest(MediaFrame::video(Duration::from_millis(33), jpeg.clone()))
        .await;

    let mut received = Vec::new();
    let mut chunk = vec![0u8; 4096];
    while received.len() < 2 * (jpeg.len() + 64) {
        let n = viewer.read(&mut chunk).await.unwrap();
        assert!(n > 0, "stream closed early");
        received.extend_from_slice(&chunk[..n]);
    }

    let text = String::from_utf8_lossy(&received);
    let boundary = format!("--{}", STREAM_BOUNDARY);
    assert!(text.matches(&boundary).count() >= 2);
    assert!(text.contains("Content-Type: image/jpeg"));
    assert!(text.contains(&format!("Content-Length: {}", jpeg.len())));

    server.stop().await;
}

#[tokio::test]
async fn slow_viewer_is_evicted_without_stalling_others() {
    let config = local_config().write_deadline(Duration::from_millis(200));
    let (server, _control, addr) = start_server(config).await;

    // Healthy viewer drains its socket continuously
    let mut healthy = connect_viewer(addr).await;
    let drain = tokio::spawn(async move {
        let mut total = 0usize;
        let mut buf = vec![0u8; 64 * 1024];
        while let Ok(n) = healthy.read(&mut buf).await {
            if n == 0 {
                break;
            }
            total += n;
        }
        total
    });

    // Slow viewer subscribes and then never reads
    let _slow = connect_viewer(addr).await;

    for _ in 0..100 {
        if server.hub().viewer_count().await == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.hub().viewer_count().await, 2);

    // Publish big frames until the slow viewer's buffers fill and the
    // write deadline evicts it
    let jpeg = Bytes::from(vec![0x5A; 512 * 1024]);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(20);
    while server.hub().viewer_count().await > 1 {
        assert!(
            tokio::time::Instant::now() < deadline,
            "slow viewer was never evicted"
        );
        server
            .ingest(MediaFrame::video(Duration::ZERO, jpeg.clone()))
            .await;
    }

    // The healthy viewer survived the eviction pass
    assert_eq!(server.hub().viewer_count().await, 1);

    server.stop().await;
    let drained = drain.await.unwrap();
    assert!(drained > 0, "healthy viewer never received data");
}

#[tokio::test]
async fn restart_rebinds_same_port_with_no_viewers() {
    // Reserve a concrete port, then release it for the server
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (server, _control) = StreamServer::new(ServerConfig::with_addr(addr));

    let first = server.start().await.unwrap();
    server.stop().await;
    let second = server.start().await.unwrap();
    assert_eq!(first, second);

    server.stop().await;
}

#[tokio::test]
async fn restart_rebinds_same_port_with_active_viewer() {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = probe.local_addr().unwrap();
    drop(probe);

    let (server, _control) = StreamServer::new(ServerConfig::with_addr(addr));
    server.start().await.unwrap();

    let _viewer = connect_viewer(addr).await;
    for _ in 0..100 {
        if server.hub().viewer_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.hub().viewer_count().await, 1);

    // Stop with a live viewer; everything must tear down cleanly
    server.stop().await;
    assert_eq!(server.hub().viewer_count().await, 0);
    assert!(server.registry().is_empty());

    // And the same port binds again immediately
    tokio_test::assert_ok!(server.start().await);
    server.stop().await;
}

#[tokio::test]
async fn viewer_disconnect_prunes_registry() {
    let (server, _control, addr) = start_server(local_config()).await;

    let viewer = connect_viewer(addr).await;
    for _ in 0..100 {
        if server.hub().viewer_count().await == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    drop(viewer);

    // Publishing notices the dead socket and removes it everywhere
    let jpeg = Bytes::from(vec![0u8; 128 * 1024]);
    for _ in 0..100 {
        server
            .ingest(MediaFrame::video(Duration::ZERO, jpeg.clone()))
            .await;
        if server.hub().viewer_count().await == 0 {
            break;
        }
    }
    assert_eq!(server.hub().viewer_count().await, 0);
    assert!(server.registry().is_empty());

    server.stop().await;
}

#[tokio::test]
async fn recording_through_ingest_produces_segments() {
    let dir = tempfile::tempdir().unwrap();
    let config = local_config().recording(
        RecorderConfig::with_dir(dir.path()).target_duration(Duration::from_secs(2)),
    );
    let (server, _control, _addr) = start_server(config).await;

    server.recorder().start().unwrap();
    assert!(server.status().await.recording);

    let jpeg = Bytes::from(vec![0xCD; 512]);
    for ts_ms in (0..=2500).step_by(500) {
        server
            .ingest(MediaFrame::video(Duration::from_millis(ts_ms), jpeg.clone()))
            .await;
    }

    assert!(dir.path().join("segment0.flv").exists());
    assert!(dir.path().join("segment1.flv").exists());

    // Stop tears the recording down with the server
    server.stop().await;
    assert!(!server.recorder().is_recording());

    let manifest = std::fs::read_to_string(dir.path().join("playlist.m3u8")).unwrap();
    assert!(manifest.contains("segment0.flv"));
}
