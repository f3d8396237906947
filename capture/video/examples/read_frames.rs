/*!
    Decode a file and print per-frame metadata.

    Usage: read_frames <path>

    Uses the headless device, so frame contents go nowhere; this is a
    pipeline smoke run for machines with a hardware decoder.
*/

use std::sync::Arc;

use capture_decode::DecoderRegistry;
use capture_types::headless::HeadlessDevice;
use capture_video::{Property, VideoCapture};

fn main() {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: read_frames <path>");
            std::process::exit(2);
        }
    };

    let mut registry = DecoderRegistry::new();
    registry.probe();

    let device = Arc::new(HeadlessDevice::new());
    let mut capture = match VideoCapture::open(&path, &registry, device) {
        Ok(capture) => capture,
        Err(err) => {
            eprintln!("failed to open {}: {}", path, err);
            std::process::exit(1);
        }
    };

    println!(
        "{}x{} @ {:.3} fps, ~{} frames",
        capture.get(Property::FrameWidth).unwrap_or(0.0),
        capture.get(Property::FrameHeight).unwrap_or(0.0),
        capture.get(Property::Fps).unwrap_or(0.0),
        capture.get(Property::FrameCount).unwrap_or(0.0),
    );

    let mut count = 0u64;
    loop {
        match capture.read() {
            Ok(Some(frame)) => {
                count += 1;
                println!(
                    "frame {:5}  {:8.3}s  {}x{}{}",
                    count,
                    frame.pts_secs,
                    frame.width,
                    frame.height,
                    if frame.keyframe { "  key" } else { "" }
                );
            }
            Ok(None) => break,
            Err(err) => {
                eprintln!("decode error: {}", err);
                std::process::exit(1);
            }
        }
    }
    println!("{} frames decoded", count);
}
