//! Recording pipeline tests on real directories

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use mjpeg_hub::{MediaFrame, RecorderConfig, SegmentWriter};

fn jpeg_frame(ms: u64) -> MediaFrame {
    MediaFrame::video(Duration::from_millis(ms), Bytes::from(vec![0xEE; 400]))
}

#[test]
fn media_sequence_increases_across_rotations() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SegmentWriter::new(
        RecorderConfig::with_dir(dir.path())
            .target_duration(Duration::from_secs(2))
            .playlist_window(2),
    );
    writer.start().unwrap();

    let mut last_sequence = None;
    let mut ts = 0u64;
    for _ in 0..6 {
        // One full segment per iteration
        while {
            writer.write_frame(&jpeg_frame(ts)).unwrap();
            ts += 500;
            ts % 2500 != 0
        } {}

        let manifest = std::fs::read_to_string(writer.playlist_path()).unwrap();
        let sequence: u64 = manifest
            .lines()
            .find_map(|l| l.strip_prefix("#EXT-X-MEDIA-SEQUENCE:"))
            .unwrap()
            .parse()
            .unwrap();

        if let Some(previous) = last_sequence {
            assert!(sequence >= previous, "media sequence went backwards");
        }
        last_sequence = Some(sequence);
    }

    // Window of 2: exactly the two most recent segments are advertised
    let manifest = std::fs::read_to_string(writer.playlist_path()).unwrap();
    assert_eq!(manifest.matches("#EXTINF").count(), 2);

    writer.stop().unwrap();
}

#[test]
fn playlist_never_observed_torn() {
    let dir = tempfile::tempdir().unwrap();
    let writer = Arc::new(
        SegmentWriter::new(
            RecorderConfig::with_dir(dir.path())
                .target_duration(Duration::from_millis(100)),
        ),
    );
    writer.start().unwrap();

    let playlist_path = writer.playlist_path();
    let stop_flag = Arc::new(AtomicBool::new(false));

    // Reader races the writer, validating every snapshot it sees
    let reader = {
        let stop_flag = Arc::clone(&stop_flag);
        std::thread::spawn(move || {
            let mut reads = 0u64;
            while !stop_flag.load(Ordering::Relaxed) {
                if let Ok(content) = std::fs::read_to_string(&playlist_path) {
                    assert!(
                        content.starts_with("#EXTM3U\n"),
                        "torn manifest: {content:?}"
                    );
                    assert!(
                        content.ends_with('\n'),
                        "truncated manifest: {content:?}"
                    );
                    // Every EXTINF line must be followed by its file name
                    let lines: Vec<&str> = content.lines().collect();
                    for (i, line) in lines.iter().enumerate() {
                        if line.starts_with("#EXTINF") {
                            assert!(
                                lines.get(i + 1).is_some_and(|n| n.starts_with("segment")),
                                "dangling EXTINF: {content:?}"
                            );
                        }
                    }
                    reads += 1;
                }
            }
            reads
        })
    };

    // Rotate fast: one segment per 100ms of timestamps
    for ts in (0..60_000u64).step_by(50) {
        writer.write_frame(&jpeg_frame(ts)).unwrap();
    }
    writer.stop().unwrap();

    stop_flag.store(true, Ordering::Relaxed);
    let reads = reader.join().unwrap();
    assert!(reads > 0, "reader never saw the playlist");
}

#[test]
fn stop_before_any_frame_leaves_empty_manifest() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SegmentWriter::new(RecorderConfig::with_dir(dir.path()));

    writer.start().unwrap();
    writer.stop().unwrap();

    let manifest = std::fs::read_to_string(writer.playlist_path()).unwrap();
    assert!(manifest.contains("#EXTM3U"));
    assert!(!manifest.contains("#EXTINF"));
    // The untouched segment 0 container was discarded rather than leaked
    assert!(!dir.path().join("segment0.flv").exists());
}

#[test]
fn recorded_segment_is_a_valid_flv_container() {
    let dir = tempfile::tempdir().unwrap();
    let writer = SegmentWriter::new(
        RecorderConfig::with_dir(dir.path()).target_duration(Duration::from_secs(1)),
    );
    writer.start().unwrap();

    for ts in [0u64, 500, 1000, 1500] {
        writer.write_frame(&jpeg_frame(ts)).unwrap();
    }
    writer.stop().unwrap();

    let bytes = std::fs::read(dir.path().join("segment0.flv")).unwrap();
    assert_eq!(&bytes[0..3], b"FLV");
    assert_eq!(bytes[3], 1); // version
    assert_eq!(bytes[4], 0x01); // video-only flags
                                // First tag after the 13-byte preamble is a video tag
    assert_eq!(bytes[13], 9);
}
