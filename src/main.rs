use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use voice_tutor::{AudioSink, Config, FileRecorder, FileSink, NullSink, TutorSession};

#[derive(Parser)]
#[command(
    name = "voice-tutor",
    about = "Voice-driven tutoring: record an explanation, get a spoken follow-up"
)]
struct Args {
    /// Config file (extension resolved by the config loader)
    #[arg(long, default_value = "config/voice-tutor")]
    config: String,

    /// Override the backend base URL
    #[arg(long)]
    backend_url: Option<String>,

    /// Audio file used as the capture source (no file means no capture
    /// device; typed messages still work)
    #[arg(long)]
    input: Option<PathBuf>,

    /// Write synthesized replies to this file instead of discarding them
    #[arg(long)]
    speech_out: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let mut config = Config::load(&args.config)?;
    if let Some(url) = args.backend_url {
        config.backend.base_url = url;
    }

    let recorder = Box::new(FileRecorder::new(args.input));
    let sink: Box<dyn AudioSink> = match args.speech_out {
        Some(path) => Box::new(FileSink::new(path)),
        None => Box::new(NullSink),
    };

    let mut session = TutorSession::new(config, recorder, None, sink)?;

    println!("Press Enter to start/stop recording. Type a message to chat. Ctrl-D quits.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let text = line.trim();
        if text.is_empty() {
            toggle_recording(&mut session).await;
        } else {
            // A line with text is input, never a recording toggle
            exchange(&mut session, text).await;
        }
    }

    Ok(())
}

async fn toggle_recording(session: &mut TutorSession) {
    if session.is_recording() {
        match session.stop_recording().await {
            Ok(Some(transcript)) => {
                println!("you: {}", transcript.text);
                exchange(session, &transcript.text).await;
            }
            Ok(None) => {}
            Err(e) => eprintln!("transcription failed: {e}"),
        }
    } else {
        match session.start_recording().await {
            Ok(()) => println!("recording... press Enter to stop"),
            Err(e) => eprintln!("could not start recording: {e}"),
        }
    }
}

async fn exchange(session: &mut TutorSession, text: &str) {
    match session.send(text).await {
        Ok(reply) => {
            println!("tutor: {reply}");
            if let Err(e) = session.speak(&reply).await {
                warn!("speech unavailable: {}", e);
            }
            session.wait_for_speech().await;
        }
        Err(e) => eprintln!("chat failed: {e}"),
    }
}
