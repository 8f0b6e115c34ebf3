use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use futures::StreamExt;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::AudioSink;
use crate::error::{Error, Result};

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Fetches and plays synthesized speech for a reply
///
/// Three response shapes are supported: direct binary audio, a JSON
/// envelope with inline base64 audio, and a JSON envelope pointing at a
/// secondary audio URL. Binary responses are streamed into the sink chunk
/// by chunk when it supports progressive append, so audible output starts
/// on the first chunk rather than after the full payload.
///
/// At most one playback session exists at a time; starting a new one
/// tears the previous one down before any network traffic.
pub struct PlaybackStreamer {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    sink: Arc<tokio::sync::Mutex<Box<dyn AudioSink>>>,
    now_playing: Arc<Mutex<Option<String>>>,
    task: Option<JoinHandle<()>>,
}

enum AudioPayload {
    /// Response body still on the wire, streamable
    Stream(reqwest::Response),
    /// Fully materialized audio bytes
    Buffered(Vec<u8>),
}

impl PlaybackStreamer {
    pub fn new(base_url: &str, timeout: Duration, sink: Box<dyn AudioSink>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/speak", base_url.trim_end_matches('/')),
            timeout,
            sink: Arc::new(tokio::sync::Mutex::new(sink)),
            now_playing: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// Text of the active playback session, if one is running
    pub fn currently_playing(&self) -> Option<String> {
        self.now_playing.lock().ok().and_then(|n| n.clone())
    }

    /// Synthesize and play `text`
    ///
    /// Returns once delivery has started; audio drains on a background
    /// task. `SynthesisUnavailable` covers every way of ending up with no
    /// audio; sink-level failures surface as warnings from the delivery
    /// task instead, since partial playback must not block the session.
    pub async fn speak(&mut self, text: &str) -> Result<()> {
        // Exclusivity: tear the previous session down before any I/O
        self.stop().await;

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SpeakRequest { text })
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::SynthesisUnavailable(format!(
                "backend returned {status}"
            )));
        }

        let content_type = Self::content_type(&response);

        if content_type.contains("audio") {
            self.spawn_playback(text, &content_type, AudioPayload::Stream(response));
            return Ok(());
        }

        if content_type.contains("application/json") {
            let body: serde_json::Value = response
                .json()
                .await
                .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;

            if let Some(encoded) = body.get("audio_base64").and_then(|v| v.as_str()) {
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(|e| {
                        Error::SynthesisUnavailable(format!("undecodable inline audio: {e}"))
                    })?;
                let mime = body
                    .get("content_type")
                    .and_then(|v| v.as_str())
                    .unwrap_or("audio/mpeg")
                    .to_string();
                self.spawn_playback(text, &mime, AudioPayload::Buffered(bytes));
                return Ok(());
            }

            if let Some(url) = body.get("audio_url").and_then(|v| v.as_str()) {
                debug!(url, "fetching synthesis audio from secondary url");
                let audio = self
                    .client
                    .get(url)
                    .timeout(self.timeout)
                    .send()
                    .await
                    .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;
                if !audio.status().is_success() {
                    return Err(Error::SynthesisUnavailable(format!(
                        "audio url returned {}",
                        audio.status()
                    )));
                }
                let mime = Self::content_type(&audio);
                let mime = if mime.is_empty() { "audio/mpeg".to_string() } else { mime };
                self.spawn_playback(text, &mime, AudioPayload::Stream(audio));
                return Ok(());
            }

            return Err(Error::SynthesisUnavailable(
                "synthesis response carried no audio".to_string(),
            ));
        }

        Err(Error::SynthesisUnavailable(format!(
            "unexpected content type: {content_type}"
        )))
    }

    /// Stop the active session and release its resources. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                task.abort();
            }
            let _ = task.await;
        }

        let stopped = self
            .now_playing
            .lock()
            .map(|mut n| n.take())
            .unwrap_or(None);

        if let Some(text) = stopped {
            if let Err(e) = self.sink.lock().await.stop().await {
                warn!("failed to release playback resources: {:#}", e);
            }
            debug!(chars = text.len(), "playback stopped");
        }
    }

    /// Wait for the active session to finish on its own
    pub async fn wait_complete(&mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    fn spawn_playback(&mut self, text: &str, mime_type: &str, payload: AudioPayload) {
        if let Ok(mut now_playing) = self.now_playing.lock() {
            *now_playing = Some(text.to_string());
        }

        let sink = Arc::clone(&self.sink);
        let now_playing = Arc::clone(&self.now_playing);
        let mime_type = mime_type.to_string();

        self.task = Some(tokio::spawn(async move {
            let result = Self::deliver(&sink, &mime_type, payload).await;
            match result {
                Ok(bytes) => info!(bytes, "playback complete"),
                Err(e) => {
                    // Playback failures are user-visible but never fatal to
                    // the rest of the session
                    warn!("playback failed: {}", e);
                    if let Err(e) = sink.lock().await.stop().await {
                        warn!("failed to release playback resources: {:#}", e);
                    }
                }
            }
            if let Ok(mut now_playing) = now_playing.lock() {
                *now_playing = None;
            }
        }));
    }

    async fn deliver(
        sink: &tokio::sync::Mutex<Box<dyn AudioSink>>,
        mime_type: &str,
        payload: AudioPayload,
    ) -> Result<u64> {
        let mut sink = sink.lock().await;

        match payload {
            AudioPayload::Stream(response) if sink.supports_streaming() => {
                sink.begin(mime_type)
                    .await
                    .map_err(|e| Error::PlaybackDecode(e.to_string()))?;

                let mut stream = response.bytes_stream();
                let mut delivered: u64 = 0;
                // Mirror of the stream so a mid-flight sink failure can
                // fall back to full-buffer playback
                let mut buffered: Vec<u8> = Vec::new();
                let mut progressive_ok = true;

                while let Some(chunk) = stream.next().await {
                    let chunk =
                        chunk.map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;
                    buffered.extend_from_slice(&chunk);
                    if progressive_ok {
                        if let Err(e) = sink.append(&chunk).await {
                            warn!("progressive append failed, buffering instead: {:#}", e);
                            progressive_ok = false;
                            let _ = sink.stop().await;
                        } else {
                            delivered += chunk.len() as u64;
                        }
                    }
                }

                if progressive_ok {
                    sink.end_of_stream()
                        .await
                        .map_err(|e| Error::PlaybackDecode(e.to_string()))?;
                    Ok(delivered)
                } else {
                    Self::play_buffered(&mut sink, mime_type, &buffered).await
                }
            }
            AudioPayload::Stream(response) => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| Error::SynthesisUnavailable(e.to_string()))?;
                Self::play_buffered(&mut sink, mime_type, &bytes).await
            }
            AudioPayload::Buffered(bytes) => {
                Self::play_buffered(&mut sink, mime_type, &bytes).await
            }
        }
    }

    async fn play_buffered(
        sink: &mut Box<dyn AudioSink>,
        mime_type: &str,
        bytes: &[u8],
    ) -> Result<u64> {
        sink.begin(mime_type)
            .await
            .map_err(|e| Error::PlaybackDecode(e.to_string()))?;
        sink.append(bytes)
            .await
            .map_err(|e| Error::PlaybackDecode(e.to_string()))?;
        sink.end_of_stream()
            .await
            .map_err(|e| Error::PlaybackDecode(e.to_string()))?;
        Ok(bytes.len() as u64)
    }

    fn content_type(response: &reqwest::Response) -> String {
        response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    }
}
