use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::audio::extension_for_mime;
use crate::error::{Error, Result};

/// Chunked media capture capability
///
/// Implementations wrap whatever the platform offers for microphone
/// access. Platform absence is a constructor-time fact: a recorder that
/// cannot exist should not be handed to the controller in the first place,
/// and one whose device disappears reports it from `start`.
#[async_trait::async_trait]
pub trait Recorder: Send + Sync {
    /// Whether this recorder can produce the given MIME type
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Acquire the device and begin delivering media fragments
    ///
    /// An empty `mime_type` asks for the recorder's default format.
    /// Fragments arrive on the returned channel in capture order; the
    /// channel closes once the device has been finalized.
    ///
    /// Errors with `PermissionDenied` or `DeviceUnavailable` when the
    /// platform refuses or lacks audio input.
    async fn start(&mut self, mime_type: &str) -> Result<mpsc::Receiver<Vec<u8>>>;

    /// Finalize capture and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Recorder name for logging
    fn name(&self) -> &str;
}

/// Recorder that replays a pre-recorded audio file as capture chunks
///
/// Used for batch transcription from the CLI and as the deterministic
/// capture source in tests. Constructed without a path it stands in for a
/// machine with no audio input and fails `start` accordingly.
pub struct FileRecorder {
    path: Option<PathBuf>,
    chunk_size: usize,
    feeder: Option<JoinHandle<()>>,
}

impl FileRecorder {
    const DEFAULT_CHUNK_SIZE: usize = 32 * 1024;

    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            chunk_size: Self::DEFAULT_CHUNK_SIZE,
            feeder: None,
        }
    }

    /// MIME type inferred from the file extension
    fn mime_for_path(path: &PathBuf) -> String {
        match path.extension().and_then(|e| e.to_str()) {
            Some("mp3") => "audio/mpeg".to_string(),
            Some("wav") => "audio/wav".to_string(),
            Some("m4a") | Some("mp4") => "audio/mp4".to_string(),
            Some("ogg") => "audio/ogg".to_string(),
            _ => "audio/webm".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Recorder for FileRecorder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        match &self.path {
            // A file source produces exactly one format
            Some(path) => extension_for_mime(mime_type) == extension_for_mime(&Self::mime_for_path(path)),
            None => false,
        }
    }

    async fn start(&mut self, _mime_type: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| Error::DeviceUnavailable("no audio input configured".to_string()))?;

        let bytes = tokio::fs::read(&path).await.map_err(|e| {
            Error::DeviceUnavailable(format!("cannot read {}: {}", path.display(), e))
        })?;

        info!(
            path = %path.display(),
            bytes = bytes.len(),
            "file recorder started"
        );

        let (tx, rx) = mpsc::channel(16);
        let chunk_size = self.chunk_size;
        self.feeder = Some(tokio::spawn(async move {
            for chunk in bytes.chunks(chunk_size) {
                if tx.send(chunk.to_vec()).await.is_err() {
                    break;
                }
            }
        }));

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(feeder) = self.feeder.take() {
            // Let the feeder finish flushing; it ends on its own once the
            // file is exhausted
            let _ = feeder.await;
            debug!("file recorder stopped");
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}
