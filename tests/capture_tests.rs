// Tests for the capture controller state machine
//
// A scripted recorder stands in for the platform microphone so chunk
// ordering, MIME negotiation, idempotent stop, and unconditional device
// release can all be verified deterministically.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use voice_tutor::capture::{CaptureController, CaptureState, Recorder};
use voice_tutor::error::Error;

/// Recorder that plays back a fixed chunk script
struct ScriptedRecorder {
    supported: Vec<&'static str>,
    chunks: Vec<Vec<u8>>,
    released: Arc<AtomicBool>,
    fail_on_start: Option<Error>,
    fail_on_stop: bool,
    tx: Option<mpsc::Sender<Vec<u8>>>,
}

impl ScriptedRecorder {
    fn new(supported: Vec<&'static str>, chunks: Vec<Vec<u8>>) -> Self {
        Self {
            supported,
            chunks,
            released: Arc::new(AtomicBool::new(false)),
            fail_on_start: None,
            fail_on_stop: false,
            tx: None,
        }
    }

    fn released_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.released)
    }
}

#[async_trait::async_trait]
impl Recorder for ScriptedRecorder {
    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.supported.contains(&mime_type)
    }

    async fn start(&mut self, _mime_type: &str) -> voice_tutor::Result<mpsc::Receiver<Vec<u8>>> {
        if let Some(err) = self.fail_on_start.take() {
            return Err(err);
        }
        let (tx, rx) = mpsc::channel(16);
        for chunk in self.chunks.drain(..) {
            tx.send(chunk).await.ok();
        }
        self.tx = Some(tx);
        Ok(rx)
    }

    async fn stop(&mut self) -> voice_tutor::Result<()> {
        // Dropping the sender closes the chunk channel
        self.tx.take();
        self.released.store(true, Ordering::SeqCst);
        if self.fail_on_stop {
            return Err(Error::DeviceUnavailable("device vanished".to_string()));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

#[tokio::test]
async fn chunks_concatenate_in_arrival_order() -> Result<()> {
    let recorder = ScriptedRecorder::new(
        vec!["audio/webm;codecs=opus"],
        vec![b"one".to_vec(), vec![], b"two".to_vec(), b"three".to_vec()],
    );
    let mut controller = CaptureController::new(Box::new(recorder));

    controller.start().await?;
    assert_eq!(controller.state(), CaptureState::Recording);

    let blob = controller.stop().await?.expect("active session yields a blob");
    // Empty fragments are skipped, order is preserved exactly
    assert_eq!(blob.bytes, b"onetwothree");
    assert_eq!(blob.mime_type, "audio/webm;codecs=opus");
    assert_eq!(controller.state(), CaptureState::Idle);

    Ok(())
}

#[tokio::test]
async fn mime_negotiation_follows_preference_order() -> Result<()> {
    // mpeg unsupported, webm/opus supported: the second preference wins
    let recorder = ScriptedRecorder::new(
        vec!["audio/webm;codecs=opus", "audio/ogg;codecs=opus"],
        vec![b"x".to_vec()],
    );
    let mut controller = CaptureController::new(Box::new(recorder));
    controller.start().await?;
    assert_eq!(controller.mime_type(), "audio/webm;codecs=opus");
    controller.stop().await?;
    Ok(())
}

#[tokio::test]
async fn unsupported_formats_fall_back_to_recorder_default() -> Result<()> {
    let recorder = ScriptedRecorder::new(vec![], vec![b"x".to_vec()]);
    let mut controller = CaptureController::new(Box::new(recorder));
    controller.start().await?;
    assert_eq!(controller.mime_type(), "");

    // The default-format blob gets the conventional capture tag
    let blob = controller.stop().await?.expect("blob");
    assert_eq!(blob.mime_type, "audio/webm");
    Ok(())
}

#[tokio::test]
async fn stop_without_session_is_a_noop() -> Result<()> {
    let recorder = ScriptedRecorder::new(vec![], vec![]);
    let mut controller = CaptureController::new(Box::new(recorder));

    assert!(controller.stop().await?.is_none());
    assert!(controller.stop().await?.is_none());
    assert_eq!(controller.state(), CaptureState::Idle);
    Ok(())
}

#[tokio::test]
async fn permission_denied_surfaces_immediately() {
    let mut recorder = ScriptedRecorder::new(vec![], vec![]);
    recorder.fail_on_start = Some(Error::PermissionDenied("user declined".to_string()));
    let mut controller = CaptureController::new(Box::new(recorder));

    let err = controller.start().await.expect_err("denied start must fail");
    assert!(matches!(err, Error::PermissionDenied(_)));
    assert_eq!(controller.state(), CaptureState::Idle);
}

#[tokio::test]
async fn device_is_released_even_when_finalize_fails() -> Result<()> {
    let mut recorder = ScriptedRecorder::new(vec![], vec![b"x".to_vec()]);
    recorder.fail_on_stop = true;
    let released = recorder.released_flag();
    let mut controller = CaptureController::new(Box::new(recorder));

    controller.start().await?;
    let result = controller.stop().await;

    assert!(result.is_err(), "finalize failure must surface");
    assert!(released.load(Ordering::SeqCst), "device must still be released");
    assert_eq!(controller.state(), CaptureState::Idle);

    // The controller is reusable: stop is a no-op again
    assert!(controller.stop().await?.is_none());
    Ok(())
}

#[tokio::test]
async fn started_event_reaches_subscribers() -> Result<()> {
    let recorder = ScriptedRecorder::new(vec![], vec![b"x".to_vec()]);
    let mut controller = CaptureController::new(Box::new(recorder));
    let mut started = controller.subscribe_started();

    controller.start().await?;
    started
        .recv()
        .await
        .expect("started event must be broadcast");
    controller.stop().await?;
    Ok(())
}
