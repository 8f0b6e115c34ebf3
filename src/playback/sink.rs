use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Audio output capability
///
/// Appends must arrive in received order; out-of-order appends corrupt the
/// stream. `end_of_stream` is the natural-end path: it plays out whatever
/// remains and releases the session's resources. `stop` is the
/// cancellation path and must be idempotent.
#[async_trait::async_trait]
pub trait AudioSink: Send + Sync {
    /// Whether chunks may be appended before the full payload is known
    fn supports_streaming(&self) -> bool;

    /// Open a playback session for audio of the given MIME type
    async fn begin(&mut self, mime_type: &str) -> Result<()>;

    /// Append the next chunk of encoded audio
    async fn append(&mut self, chunk: &[u8]) -> Result<()>;

    /// All audio delivered; finish playback and release resources
    async fn end_of_stream(&mut self) -> Result<()>;

    /// Cancel playback and release resources
    async fn stop(&mut self) -> Result<()>;
}

/// Sink that writes synthesized audio to a file
///
/// Stands in for a speaker on headless machines: the CLI points it at a
/// path and the spoken reply lands there. Cancellation removes the partial
/// file; natural completion keeps it.
pub struct FileSink {
    path: PathBuf,
    file: Option<tokio::fs::File>,
}

impl FileSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path, file: None }
    }
}

#[async_trait::async_trait]
impl AudioSink for FileSink {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn begin(&mut self, mime_type: &str) -> Result<()> {
        debug!(path = %self.path.display(), mime_type, "file sink opened");
        let file = tokio::fs::File::create(&self.path)
            .await
            .context("failed to create speech output file")?;
        self.file = Some(file);
        Ok(())
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.file.as_mut().context("sink not started")?;
        file.write_all(chunk)
            .await
            .context("failed to write speech output")?;
        Ok(())
    }

    async fn end_of_stream(&mut self) -> Result<()> {
        if let Some(mut file) = self.file.take() {
            file.flush().await.context("failed to flush speech output")?;
            debug!(path = %self.path.display(), "speech output written");
        }
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.file.take().is_some() {
            // Partial output is a transient resource; drop it
            let _ = tokio::fs::remove_file(&self.path).await;
            debug!(path = %self.path.display(), "partial speech output discarded");
        }
        Ok(())
    }
}

/// Sink that discards audio entirely (no output device)
#[derive(Debug, Default)]
pub struct NullSink;

#[async_trait::async_trait]
impl AudioSink for NullSink {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn begin(&mut self, _mime_type: &str) -> Result<()> {
        Ok(())
    }

    async fn append(&mut self, _chunk: &[u8]) -> Result<()> {
        Ok(())
    }

    async fn end_of_stream(&mut self) -> Result<()> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        Ok(())
    }
}
