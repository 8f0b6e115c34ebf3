//! Synthesized speech playback
//!
//! The streamer fetches audio for a reply from the backend `speak`
//! endpoint and feeds it to an `AudioSink` capability, progressively when
//! the sink supports it. At most one playback session is active at a time.

mod sink;
mod streamer;

pub use sink::{AudioSink, FileSink, NullSink};
pub use streamer::PlaybackStreamer;
