//! Synthetic camera demo - streams generated frames to browsers
//!
//! Run with: cargo run --example synthetic_camera -- [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example synthetic_camera                  # binds to 0.0.0.0:8080
//!   cargo run --example synthetic_camera 127.0.0.1:9000
//!
//! Then open http://localhost:8080/ in a browser. The page shows the live
//! stream and control buttons; toggling recording writes segments plus a
//! sliding-window playlist under ./recordings.
//!
//! No camera is involved: a generator task fabricates minimal JPEG-framed
//! payloads at 15 fps, which is enough to exercise the full pipeline
//! (multipart fan-out, slow-viewer eviction, segmented recording).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;

use mjpeg_hub::{ControlEvent, MediaFrame, RecorderConfig, ServerConfig, StreamServer};

/// Smallest payload browsers will treat as an image part; real deployments
/// feed actual encoder output here.
fn fake_jpeg(seq: u64) -> Bytes {
    let mut data = Vec::with_capacity(256);
    data.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    data.extend_from_slice(&seq.to_be_bytes());
    data.resize(254, 0x55);
    data.extend_from_slice(&[0xFF, 0xD9]);
    Bytes::from(data)
}

#[tokio::main]
async fn main() -> mjpeg_hub::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let bind_addr: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "0.0.0.0:8080".to_string())
        .parse()
        .map_err(|e| mjpeg_hub::Error::InvalidRequest(format!("bad bind address: {e}")))?;

    let config = ServerConfig::with_addr(bind_addr)
        .recording(RecorderConfig::with_dir("recordings"));
    let (server, mut control) = StreamServer::new(config);
    let server = Arc::new(server);

    let addr = server.start().await?;
    println!("Viewer page:  http://{addr}/");
    println!("Raw stream:   http://{addr}/stream");
    println!("Status:       http://{addr}/status");

    let video_enabled = Arc::new(AtomicBool::new(true));

    // Generator task: the stand-in for a capture pipeline
    let generator = {
        let server = Arc::clone(&server);
        let video_enabled = Arc::clone(&video_enabled);
        tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = tokio::time::interval(Duration::from_millis(66));
            let mut seq = 0u64;
            loop {
                ticker.tick().await;
                if video_enabled.load(Ordering::Relaxed) {
                    let frame = MediaFrame::video(started.elapsed(), fake_jpeg(seq));
                    server.ingest(frame).await;
                    seq += 1;
                }
            }
        })
    };

    // Control events come back from the browser buttons; the embedder owns
    // the actual state flips.
    let controller = {
        let server = Arc::clone(&server);
        let video_enabled = Arc::clone(&video_enabled);
        tokio::spawn(async move {
            while let Some(event) = control.recv().await {
                match event {
                    ControlEvent::ToggleVideo => {
                        let now = !video_enabled.load(Ordering::Relaxed);
                        video_enabled.store(now, Ordering::Relaxed);
                        println!("video {}", if now { "on" } else { "off" });
                    }
                    ControlEvent::ToggleAudio => {
                        println!("audio toggle requested (no audio source in this demo)");
                    }
                    ControlEvent::ToggleRecording => {
                        let recorder = server.recorder();
                        let result = if recorder.is_recording() {
                            recorder.stop()
                        } else {
                            recorder.start()
                        };
                        match result {
                            Ok(()) => println!("recording: {}", recorder.is_recording()),
                            Err(e) => eprintln!("recorder error: {e}"),
                        }
                    }
                    ControlEvent::ChangeResolution(label) => {
                        println!("resolution change requested: {label}");
                    }
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    println!("shutting down");
    generator.abort();
    controller.abort();
    server.stop().await;
    Ok(())
}
