//! Error types for the voice tutor pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice pipeline
///
/// Capture errors are fatal to the current recording session. Encoder and
/// recognizer failures are absorbed by their callers (both have defined
/// fallbacks) and never appear here. Upload errors are only surfaced after
/// the local fallback transcript has been consulted.
#[derive(Debug, Error)]
pub enum Error {
    /// Microphone access was denied by the platform
    #[error("microphone permission denied: {0}")]
    PermissionDenied(String),

    /// No usable audio input device
    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Upload attempt (including the single retry) timed out
    #[error("transcription upload timed out after {attempts} attempts")]
    UploadTimeout { attempts: u32 },

    /// Backend answered the upload with a non-success status
    #[error("transcription upload failed with status {0}")]
    UploadHttp(u16),

    /// Upload failed below the HTTP layer
    #[error("transcription upload network error: {0}")]
    UploadNetwork(String),

    /// Both the remote path and the local fallback produced nothing
    #[error("no transcription available")]
    NoTranscriptAvailable,

    /// Speech synthesis returned no audio in any supported shape
    #[error("speech synthesis unavailable: {0}")]
    SynthesisUnavailable(String),

    /// The audio sink rejected or failed to decode synthesized audio
    #[error("playback decode error: {0}")]
    PlaybackDecode(String),

    /// Chat backend error
    #[error("chat error: {0}")]
    Chat(String),

    /// Conversation store error
    #[error("conversation store error: {0}")]
    Store(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
