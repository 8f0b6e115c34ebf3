//! HTTP clients for the remote inference backend
//!
//! The backend is consumed as opaque HTTP services: `transcribe-audio`
//! (multipart upload), `chat` / `chat-with-image`, and `speak` (handled by
//! the playback module). Responses come in heterogeneous shapes, so every
//! client here parses defensively.

mod chat;
mod upload;

pub use chat::{ChatClient, ChatReply, ImageAttachment};
pub use upload::UploadTransport;

/// Where a resolved transcript came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptSource {
    Remote,
    LocalFallback,
}

/// A resolved transcript. `text` is always non-empty; when both the remote
/// and local paths fail there is no result at all, only an error.
#[derive(Debug, Clone)]
pub struct TranscriptResult {
    pub text: String,
    pub source: TranscriptSource,
}
