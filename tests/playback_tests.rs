// Tests for synthesized speech playback
//
// A recording sink captures the exact sequence of sink calls, so all three
// backend response shapes, the buffered fallback, and session exclusivity
// can be asserted without an audio device.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use axum::http::header;
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use serde_json::json;

use voice_tutor::error::Error;
use voice_tutor::playback::{AudioSink, PlaybackStreamer};

#[derive(Debug, Clone, PartialEq)]
enum SinkEvent {
    Begin(String),
    Append(Vec<u8>),
    EndOfStream,
    Stop,
}

/// Sink that records every call it receives
struct RecordingSink {
    events: Arc<Mutex<Vec<SinkEvent>>>,
    streaming: bool,
    append_delay: Option<Duration>,
}

impl RecordingSink {
    fn new(streaming: bool) -> (Self, Arc<Mutex<Vec<SinkEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: Arc::clone(&events),
                streaming,
                append_delay: None,
            },
            events,
        )
    }

    fn push(&self, event: SinkEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[async_trait::async_trait]
impl AudioSink for RecordingSink {
    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn begin(&mut self, mime_type: &str) -> Result<()> {
        self.push(SinkEvent::Begin(mime_type.to_string()));
        Ok(())
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if let Some(delay) = self.append_delay {
            tokio::time::sleep(delay).await;
        }
        self.push(SinkEvent::Append(chunk.to_vec()));
        Ok(())
    }

    async fn end_of_stream(&mut self) -> Result<()> {
        self.push(SinkEvent::EndOfStream);
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        self.push(SinkEvent::Stop);
        Ok(())
    }
}

/// Sink whose first append fails, forcing the buffered fallback
struct FlakySink {
    inner: RecordingSink,
    failed_once: bool,
}

#[async_trait::async_trait]
impl AudioSink for FlakySink {
    fn supports_streaming(&self) -> bool {
        true
    }

    async fn begin(&mut self, mime_type: &str) -> Result<()> {
        self.inner.begin(mime_type).await
    }

    async fn append(&mut self, chunk: &[u8]) -> Result<()> {
        if !self.failed_once {
            self.failed_once = true;
            anyhow::bail!("decoder rejected the chunk");
        }
        self.inner.append(chunk).await
    }

    async fn end_of_stream(&mut self) -> Result<()> {
        self.inner.end_of_stream().await
    }

    async fn stop(&mut self) -> Result<()> {
        self.inner.stop().await
    }
}

async fn serve(app: Router) -> Result<String> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok(format!("http://{addr}"))
}

fn mp3_payload() -> Vec<u8> {
    (0..4096u32).map(|i| (i % 251) as u8).collect()
}

fn binary_speak_router(payload: Vec<u8>) -> Router {
    Router::new().route(
        "/speak",
        post(move || async move { ([(header::CONTENT_TYPE, "audio/mpeg")], payload) }),
    )
}

fn appended_bytes(events: &[SinkEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            SinkEvent::Append(chunk) => Some(chunk.as_slice()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .concat()
}

#[tokio::test]
async fn binary_response_streams_into_the_sink() -> Result<()> {
    let payload = mp3_payload();
    let base = serve(binary_speak_router(payload.clone())).await?;

    let (sink, events) = RecordingSink::new(true);
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    streamer.speak("hello").await?;
    assert_eq!(streamer.currently_playing().as_deref(), Some("hello"));
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    assert_eq!(events.first(), Some(&SinkEvent::Begin("audio/mpeg".to_string())));
    assert_eq!(events.last(), Some(&SinkEvent::EndOfStream));
    assert_eq!(appended_bytes(&events), payload);
    drop(events);

    // Natural completion clears the active-session label
    assert!(streamer.currently_playing().is_none());

    Ok(())
}

#[tokio::test]
async fn non_streaming_sink_gets_one_buffered_append() -> Result<()> {
    let payload = mp3_payload();
    let base = serve(binary_speak_router(payload.clone())).await?;

    let (sink, events) = RecordingSink::new(false);
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    streamer.speak("hello").await?;
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            SinkEvent::Begin("audio/mpeg".to_string()),
            SinkEvent::Append(payload),
            SinkEvent::EndOfStream,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn inline_base64_audio_plays_buffered() -> Result<()> {
    let payload = b"inline wav bytes".to_vec();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&payload);

    let app = Router::new().route(
        "/speak",
        post(move || async move {
            Json(json!({ "audio_base64": encoded, "content_type": "audio/wav" }))
        }),
    );
    let base = serve(app).await?;

    let (sink, events) = RecordingSink::new(true);
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    streamer.speak("hello").await?;
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            SinkEvent::Begin("audio/wav".to_string()),
            SinkEvent::Append(payload),
            SinkEvent::EndOfStream,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn audio_url_envelope_triggers_a_secondary_fetch() -> Result<()> {
    let payload = mp3_payload();

    // The /speak handler needs its own base URL to mint the audio link, so
    // bind first and build the router around the address
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let audio_url = format!("http://{addr}/synth/audio.mp3");

    let app = Router::new()
        .route(
            "/speak",
            post(move || async move { Json(json!({ "audio_url": audio_url })) }),
        )
        .route(
            "/synth/audio.mp3",
            get({
                let payload = payload.clone();
                move || async move { ([(header::CONTENT_TYPE, "audio/mpeg")], payload) }
            }),
        );
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    let (sink, events) = RecordingSink::new(true);
    let mut streamer =
        PlaybackStreamer::new(&format!("http://{addr}"), Duration::from_secs(5), Box::new(sink));

    streamer.speak("hello").await?;
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    assert_eq!(events.first(), Some(&SinkEvent::Begin("audio/mpeg".to_string())));
    assert_eq!(events.last(), Some(&SinkEvent::EndOfStream));
    assert_eq!(appended_bytes(&events), payload);

    Ok(())
}

#[tokio::test]
async fn audioless_response_fails_without_touching_the_sink() -> Result<()> {
    let app = Router::new().route(
        "/speak",
        post(|| async { Json(json!({ "status": "no voice configured" })) }),
    );
    let base = serve(app).await?;

    let (sink, events) = RecordingSink::new(true);
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    let err = streamer.speak("hello").await.expect_err("no audio to play");
    assert!(matches!(err, Error::SynthesisUnavailable(_)));
    assert!(events.lock().unwrap().is_empty());
    assert!(streamer.currently_playing().is_none());

    Ok(())
}

#[tokio::test]
async fn failed_progressive_append_falls_back_to_buffered() -> Result<()> {
    let payload = mp3_payload();
    let base = serve(binary_speak_router(payload.clone())).await?;

    let (inner, events) = RecordingSink::new(true);
    let sink = FlakySink {
        inner,
        failed_once: false,
    };
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    streamer.speak("hello").await?;
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    // Progressive session opened, torn down on the failed append, then the
    // whole payload replayed as one buffered pass
    assert_eq!(
        *events,
        vec![
            SinkEvent::Begin("audio/mpeg".to_string()),
            SinkEvent::Stop,
            SinkEvent::Begin("audio/mpeg".to_string()),
            SinkEvent::Append(payload),
            SinkEvent::EndOfStream,
        ]
    );

    Ok(())
}

#[tokio::test]
async fn new_speech_stops_the_previous_session_first() -> Result<()> {
    let payload = mp3_payload();
    let base = serve(binary_speak_router(payload.clone())).await?;

    let (mut sink, events) = RecordingSink::new(true);
    // Slow appends keep the first session mid-flight when the second starts
    sink.append_delay = Some(Duration::from_millis(200));
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    streamer.speak("first reply").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(streamer.currently_playing().as_deref(), Some("first reply"));

    streamer.speak("second reply").await?;
    assert_eq!(streamer.currently_playing().as_deref(), Some("second reply"));
    streamer.wait_complete().await;

    let events = events.lock().unwrap();
    let stop_at = events
        .iter()
        .position(|e| *e == SinkEvent::Stop)
        .expect("first session must be stopped");
    let second_begin = events
        .iter()
        .skip(stop_at)
        .position(|e| matches!(e, SinkEvent::Begin(_)))
        .expect("second session must begin after the stop");
    assert!(second_begin > 0, "stop must precede the second begin");
    assert_eq!(events.last(), Some(&SinkEvent::EndOfStream));
    drop(events);

    assert!(streamer.currently_playing().is_none());

    Ok(())
}

#[tokio::test]
async fn stop_is_idempotent() -> Result<()> {
    let base = serve(binary_speak_router(mp3_payload())).await?;
    let (mut sink, events) = RecordingSink::new(true);
    // Keep the session alive long enough for stop to catch it mid-flight
    sink.append_delay = Some(Duration::from_millis(200));
    let mut streamer = PlaybackStreamer::new(&base, Duration::from_secs(5), Box::new(sink));

    // No session yet: nothing to release
    streamer.stop().await;
    assert!(events.lock().unwrap().is_empty());

    streamer.speak("hello").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    streamer.stop().await;
    streamer.stop().await;

    let stops = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| **e == SinkEvent::Stop)
        .count();
    assert_eq!(stops, 1, "only the live session releases resources");

    Ok(())
}
