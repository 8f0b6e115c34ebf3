use std::time::Duration;

use tracing::{info, warn};

use crate::audio::WavEncoder;
use crate::capture::{CaptureController, Recorder};
use crate::config::Config;
use crate::conversation::ConversationStore;
use crate::error::Result;
use crate::playback::{AudioSink, PlaybackStreamer};
use crate::recognizer::{LocalFallback, SpeechRecognizer};
use crate::transport::{ChatClient, TranscriptResult, UploadTransport};

/// One user's voice tutoring session
pub struct TutorSession {
    config: Config,
    controller: CaptureController,
    fallback: LocalFallback,
    encoder: WavEncoder,
    transport: UploadTransport,
    chat: ChatClient,
    playback: PlaybackStreamer,
    store: ConversationStore,
    /// Backend conversation handle, kept across turns once issued
    chat_session_id: Option<String>,
}

impl TutorSession {
    /// Build a session from injected platform capabilities
    ///
    /// The recognizer is optional: without it the pipeline simply has no
    /// local fallback transcript.
    pub fn new(
        config: Config,
        recorder: Box<dyn Recorder>,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        sink: Box<dyn AudioSink>,
    ) -> Result<Self> {
        let upload_timeout = Duration::from_secs(config.backend.upload_timeout_secs);
        let request_timeout = Duration::from_secs(config.backend.request_timeout_secs);

        let store = ConversationStore::open(&config.conversation.store_path)?;

        Ok(Self {
            controller: CaptureController::new(recorder),
            fallback: LocalFallback::new(recognizer),
            encoder: WavEncoder::new(),
            transport: UploadTransport::new(&config.backend.base_url, upload_timeout),
            chat: ChatClient::new(&config.backend.base_url, request_timeout),
            playback: PlaybackStreamer::new(&config.backend.base_url, request_timeout, sink),
            store,
            chat_session_id: None,
            config,
        })
    }

    pub fn is_recording(&self) -> bool {
        self.controller.is_recording()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConversationStore {
        &mut self.store
    }

    /// Begin a recording session
    ///
    /// Any in-flight speech is silenced first; recording and playback
    /// never overlap.
    pub async fn start_recording(&mut self) -> Result<()> {
        self.playback.stop().await;
        self.controller.start().await?;
        self.fallback.start(&self.config.audio.language).await;
        Ok(())
    }

    /// Stop recording and resolve a transcript
    ///
    /// The captured blob is re-encoded to WAV within the configured budget
    /// (falling back to the raw container), uploaded, and resolved against
    /// the local fallback transcript. Returns `None` when no recording was
    /// active. The microphone is released before any of the downstream
    /// steps can fail.
    pub async fn stop_recording(&mut self) -> Result<Option<TranscriptResult>> {
        let blob = self.controller.stop().await;
        self.fallback.stop().await;

        let Some(raw) = blob? else {
            return Ok(None);
        };

        let budget = Duration::from_millis(self.config.audio.encode_budget_ms);
        let upload = match self.encoder.encode(&raw, budget).await {
            Some(wav) => wav,
            None => raw,
        };

        let local = self.fallback.transcript();
        let transcript = self.transport.resolve(&upload, local.as_deref()).await?;
        info!(source = ?transcript.source, "transcript resolved");
        Ok(Some(transcript))
    }

    /// Send a transcript or typed message to the tutor and return the reply
    ///
    /// The conversation records the outgoing message and a pending
    /// placeholder immediately; the placeholder is replaced in place by
    /// the reply or an error notice.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        self.store.begin_exchange(text)?;

        match self.chat.chat(text, self.chat_session_id.as_deref()).await {
            Ok(reply) => {
                if reply.session_id.is_some() {
                    self.chat_session_id = reply.session_id.clone();
                }
                self.store.resolve_pending(&reply.text)?;
                Ok(reply.text)
            }
            Err(e) => {
                if let Err(store_err) = self.store.fail_pending(&e.to_string()) {
                    warn!("failed to record chat error: {}", store_err);
                }
                Err(e)
            }
        }
    }

    /// Render a reply as synthesized speech
    pub async fn speak(&mut self, text: &str) -> Result<()> {
        self.playback.speak(text).await
    }

    /// Wait for in-flight speech to finish playing
    pub async fn wait_for_speech(&mut self) {
        self.playback.wait_complete().await;
    }
}
