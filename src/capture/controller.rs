use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Recorder, MIME_PREFERENCES};
use crate::audio::AudioBlob;
use crate::error::Result;

/// Capture session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Recording,
    Processing,
}

/// Drives one chunked recording session at a time
///
/// `start` negotiates a MIME type, acquires the device through the
/// `Recorder` capability and accumulates fragments in arrival order.
/// `stop` finalizes the device and concatenates the fragments into a raw
/// `AudioBlob`; device release is unconditional and does not depend on
/// anything downstream succeeding.
pub struct CaptureController {
    recorder: Box<dyn Recorder>,
    state: CaptureState,
    mime_type: String,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    collector: Option<JoinHandle<()>>,
    started_tx: broadcast::Sender<()>,
}

impl CaptureController {
    pub fn new(recorder: Box<dyn Recorder>) -> Self {
        let (started_tx, _) = broadcast::channel(8);
        Self {
            recorder,
            state: CaptureState::Idle,
            mime_type: String::new(),
            chunks: Arc::new(Mutex::new(Vec::new())),
            collector: None,
            started_tx,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == CaptureState::Recording
    }

    /// Subscribe to recording-started events
    ///
    /// Consumers use this to halt conflicting audio output (the playback
    /// streamer stops speaking when a new recording begins).
    pub fn subscribe_started(&self) -> broadcast::Receiver<()> {
        self.started_tx.subscribe()
    }

    /// Negotiated MIME type of the active session
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Acquire the microphone and begin recording
    ///
    /// Capture errors (`PermissionDenied`, `DeviceUnavailable`) are fatal
    /// to the session and surfaced immediately; there is no silent
    /// fallback.
    pub async fn start(&mut self) -> Result<()> {
        if self.state == CaptureState::Recording {
            warn!("recording already started");
            return Ok(());
        }

        let mime_type = MIME_PREFERENCES
            .iter()
            .find(|m| self.recorder.is_type_supported(m))
            .map_or_else(String::new, |m| (*m).to_string());

        let mut rx = self.recorder.start(&mime_type).await?;

        info!(
            recorder = self.recorder.name(),
            mime_type = %if mime_type.is_empty() { "(default)" } else { &mime_type },
            "recording started"
        );

        self.mime_type = mime_type;
        if let Ok(mut chunks) = self.chunks.lock() {
            chunks.clear();
        }

        let chunks = Arc::clone(&self.chunks);
        self.collector = Some(tokio::spawn(async move {
            while let Some(chunk) = rx.recv().await {
                if chunk.is_empty() {
                    continue;
                }
                if let Ok(mut chunks) = chunks.lock() {
                    chunks.push(chunk);
                }
            }
        }));

        self.state = CaptureState::Recording;
        let _ = self.started_tx.send(());

        Ok(())
    }

    /// Finalize the session and return the raw captured blob
    ///
    /// Idempotent: returns `None` when no session is active. The device is
    /// released before any result is produced, including on error.
    pub async fn stop(&mut self) -> Result<Option<AudioBlob>> {
        if self.state != CaptureState::Recording {
            debug!("stop with no active session");
            return Ok(None);
        }

        self.state = CaptureState::Processing;

        // Release the device first; chunk assembly happens regardless of
        // whether finalization reported an error
        let stop_result = self.recorder.stop().await;

        if let Some(collector) = self.collector.take() {
            if let Err(e) = collector.await {
                warn!("chunk collector task failed: {}", e);
            }
        }

        let chunks = self
            .chunks
            .lock()
            .map(|mut chunks| std::mem::take(&mut *chunks))
            .unwrap_or_default();
        let total: usize = chunks.iter().map(Vec::len).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in chunks {
            bytes.extend_from_slice(&chunk);
        }

        let mime_type = if self.mime_type.is_empty() {
            "audio/webm".to_string()
        } else {
            self.mime_type.clone()
        };

        self.state = CaptureState::Idle;
        stop_result?;

        info!(bytes = bytes.len(), mime_type = %mime_type, "recording finalized");
        Ok(Some(AudioBlob::new(bytes, mime_type)))
    }
}
