pub mod audio;
pub mod capture;
pub mod config;
pub mod conversation;
pub mod error;
pub mod playback;
pub mod recognizer;
pub mod session;
pub mod transport;

pub use audio::{
    extension_for_mime, AudioBlob, AudioDecoder, DecodedAudio, SymphoniaDecoder, WavEncoder,
};
pub use capture::{CaptureController, CaptureState, FileRecorder, Recorder};
pub use config::Config;
pub use conversation::{Conversation, ConversationMessage, ConversationStore, Role};
pub use error::{Error, Result};
pub use playback::{AudioSink, FileSink, NullSink, PlaybackStreamer};
pub use recognizer::{LocalFallback, RecognizerSegment, SpeechRecognizer, TranscriptAggregator};
pub use session::TutorSession;
pub use transport::{
    ChatClient, ChatReply, ImageAttachment, TranscriptResult, TranscriptSource, UploadTransport,
};
