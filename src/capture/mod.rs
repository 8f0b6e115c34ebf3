//! Microphone capture
//!
//! This module owns the recording half of the pipeline:
//! - `Recorder`: platform capability trait for chunked media capture
//! - `FileRecorder`: file-backed recorder for batch use and testing
//! - `CaptureController`: the Idle → Recording → Processing state machine

mod controller;
mod recorder;

pub use controller::{CaptureController, CaptureState};
pub use recorder::{FileRecorder, Recorder};

/// MIME types probed at session start, most preferred first. An empty
/// string means "whatever the recorder produces by default".
pub const MIME_PREFERENCES: [&str; 3] = [
    "audio/mpeg",
    "audio/webm;codecs=opus",
    "audio/ogg;codecs=opus",
];
