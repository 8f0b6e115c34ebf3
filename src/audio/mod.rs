//! Audio pipeline primitives
//!
//! This module provides the pieces between capture and upload:
//! - `AudioBlob`: an immutable captured byte buffer plus its MIME tag
//! - `AudioDecoder` / `SymphoniaDecoder`: container-to-PCM decoding
//! - `WavEncoder`: time-boxed re-encoding to canonical 16-bit WAV

mod decoder;
mod encoder;

pub use decoder::{AudioDecoder, DecodedAudio, SymphoniaDecoder};
pub use encoder::{interleave, serialize_wav, WavEncoder};

/// MIME type of the canonical upload format
pub const WAV_MIME: &str = "audio/wav";

/// Immutable audio buffer plus MIME-type tag
///
/// Produced either by concatenating capture chunks (raw) or by the encoder
/// (WAV). Never mutated after finalization.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl AudioBlob {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Filename extension for this blob's MIME type
    pub fn extension(&self) -> &'static str {
        extension_for_mime(&self.mime_type)
    }
}

/// Map a MIME type to an upload filename extension
///
/// Unknown or empty types fall back to `webm`, the most common capture
/// container.
pub fn extension_for_mime(mime: &str) -> &'static str {
    if mime.contains("mpeg") || mime.contains("mp3") {
        "mp3"
    } else if mime.contains("wav") {
        "wav"
    } else if mime.contains("m4a") || mime.contains("mp4") {
        "m4a"
    } else if mime.contains("webm") {
        "webm"
    } else if mime.contains("ogg") {
        "ogg"
    } else {
        "webm"
    }
}
