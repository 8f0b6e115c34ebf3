//! Local fallback speech recognition
//!
//! An on-device streaming recognizer runs in parallel with recording and
//! accumulates a best-effort transcript. Its output is consulted only when
//! the remote transcription path fails or returns nothing; it never
//! overwrites a non-empty remote transcript.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// A single recognizer-reported result segment
#[derive(Debug, Clone)]
pub struct RecognizerSegment {
    /// Result index assigned by the recognizer. Segments may arrive out of
    /// order; the aggregate transcript follows this index, not arrival.
    pub index: usize,
    pub text: String,
    /// Interim results are discarded; only final segments accumulate
    pub is_final: bool,
}

/// Streaming recognition capability
///
/// Present only on platforms that expose an on-device recognizer; the
/// pipeline treats absence as a constructor-time fact and simply skips the
/// fallback path.
#[async_trait::async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Begin streaming recognition; segments arrive on the returned channel
    async fn start(&mut self, language: &str) -> Result<mpsc::Receiver<RecognizerSegment>>;

    /// Stop recognition; the segment channel closes once drained
    async fn stop(&mut self) -> Result<()>;
}

/// Accumulates final segments into one transcript, ordered by result index
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    segments: BTreeMap<usize, String>,
}

impl TranscriptAggregator {
    pub fn push(&mut self, segment: &RecognizerSegment) {
        if !segment.is_final {
            return;
        }
        self.segments.insert(segment.index, segment.text.clone());
    }

    /// Concatenation of final segments in index order
    pub fn transcript(&self) -> String {
        self.segments.values().cloned().collect()
    }
}

/// Runs a recognizer capability alongside a recording session
///
/// All recognizer errors are absorbed here; the fallback either has text
/// or it does not, and the rest of the pipeline never sees a failure.
pub struct LocalFallback {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    aggregator: Arc<Mutex<TranscriptAggregator>>,
    collector: Option<JoinHandle<()>>,
}

impl LocalFallback {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            recognizer,
            aggregator: Arc::new(Mutex::new(TranscriptAggregator::default())),
            collector: None,
        }
    }

    /// Start recognition, if the capability exists
    pub async fn start(&mut self, language: &str) {
        let Some(recognizer) = self.recognizer.as_mut() else {
            debug!("no local recognizer available");
            return;
        };

        if let Ok(mut aggregator) = self.aggregator.lock() {
            *aggregator = TranscriptAggregator::default();
        }

        match recognizer.start(language).await {
            Ok(mut rx) => {
                let aggregator = Arc::clone(&self.aggregator);
                self.collector = Some(tokio::spawn(async move {
                    while let Some(segment) = rx.recv().await {
                        if let Ok(mut aggregator) = aggregator.lock() {
                            aggregator.push(&segment);
                        }
                    }
                }));
                debug!(language, "local fallback recognizer started");
            }
            Err(e) => {
                warn!("local recognizer failed to start: {:#}", e);
            }
        }
    }

    /// Stop recognition and wait for the last segments to land
    pub async fn stop(&mut self) {
        if let Some(recognizer) = self.recognizer.as_mut() {
            if let Err(e) = recognizer.stop().await {
                warn!("local recognizer failed to stop: {:#}", e);
            }
        }
        if let Some(collector) = self.collector.take() {
            let _ = collector.await;
        }
    }

    /// The accumulated transcript, if any non-whitespace text exists
    pub fn transcript(&self) -> Option<String> {
        let text = self
            .aggregator
            .lock()
            .map(|a| a.transcript())
            .unwrap_or_default();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}
