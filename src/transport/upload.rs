use std::time::Duration;

use tracing::{debug, info, warn};

use super::{TranscriptResult, TranscriptSource};
use crate::audio::AudioBlob;
use crate::error::{Error, Result};

/// Uploads finalized audio to the transcription endpoint
///
/// One attempt gets the configured timeout; a timed-out attempt is retried
/// exactly once, sequentially, after the first attempt's cancellation has
/// been observed. Failures consult the local fallback transcript before
/// anything is surfaced.
pub struct UploadTransport {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl UploadTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/transcribe-audio", base_url.trim_end_matches('/')),
            timeout,
        }
    }

    /// Upload the blob and return the remote transcript text
    ///
    /// The returned string may be empty or whitespace-only; resolution
    /// against the local fallback happens in [`resolve`](Self::resolve).
    pub async fn upload(&self, blob: &AudioBlob) -> Result<String> {
        debug!(
            bytes = blob.bytes.len(),
            mime_type = %blob.mime_type,
            "uploading audio for transcription"
        );

        let response = match self.attempt(blob).await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("upload timed out, retrying once");
                match self.attempt(blob).await {
                    Ok(response) => response,
                    Err(e) if e.is_timeout() => {
                        return Err(Error::UploadTimeout { attempts: 2 });
                    }
                    Err(e) => return Err(Error::UploadNetwork(e.to_string())),
                }
            }
            Err(e) => return Err(Error::UploadNetwork(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "transcription upload rejected");
            return Err(Error::UploadHttp(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let text = if content_type.contains("application/json") {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Error::UploadNetwork(e.to_string()))?;
            body.get("transcription")
                .or_else(|| body.get("text"))
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string()
        } else {
            response
                .text()
                .await
                .map_err(|e| Error::UploadNetwork(e.to_string()))?
        };

        Ok(text)
    }

    /// Resolve a transcript from the remote path with local fallback
    ///
    /// Precedence: a non-empty remote transcript always wins. Upload
    /// failures and empty remote transcripts fall back to whatever the
    /// local recognizer accumulated; only when no fallback text exists is
    /// the failure surfaced.
    pub async fn resolve(
        &self,
        blob: &AudioBlob,
        local_fallback: Option<&str>,
    ) -> Result<TranscriptResult> {
        let fallback = || {
            local_fallback
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(|t| TranscriptResult {
                    text: t.to_string(),
                    source: TranscriptSource::LocalFallback,
                })
        };

        match self.upload(blob).await {
            Ok(text) if !text.trim().is_empty() => {
                info!("transcription received");
                Ok(TranscriptResult {
                    text: text.trim().to_string(),
                    source: TranscriptSource::Remote,
                })
            }
            Ok(_) => match fallback() {
                Some(result) => {
                    info!("empty remote transcription, using local transcript");
                    Ok(result)
                }
                None => Err(Error::NoTranscriptAvailable),
            },
            Err(e) => match fallback() {
                Some(result) => {
                    warn!("upload failed ({}), using local transcript", e);
                    Ok(result)
                }
                None => Err(e),
            },
        }
    }

    async fn attempt(&self, blob: &AudioBlob) -> std::result::Result<reqwest::Response, reqwest::Error> {
        let mime_type = if blob.mime_type.is_empty() {
            "audio/webm"
        } else {
            &blob.mime_type
        };

        let part = reqwest::multipart::Part::bytes(blob.bytes.clone())
            .file_name(format!("recording.{}", blob.extension()))
            .mime_str(mime_type)
            .unwrap_or_else(|_| {
                reqwest::multipart::Part::bytes(blob.bytes.clone())
                    .file_name(format!("recording.{}", blob.extension()))
            });
        let form = reqwest::multipart::Form::new().part("file", part);

        self.client
            .post(&self.endpoint)
            .multipart(form)
            .timeout(self.timeout)
            .send()
            .await
    }
}
