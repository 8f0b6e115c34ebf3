use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::timeout;
use tracing::{debug, warn};

use super::{AudioBlob, AudioDecoder, DecodedAudio, SymphoniaDecoder, WAV_MIME};

/// Interleave channel-separated samples in frame order
///
/// For N channels and frame i the output is ch0[i], ch1[i], … chN-1[i].
/// A mono input is returned as-is.
pub fn interleave(decoded: &DecodedAudio) -> Vec<f32> {
    if decoded.channels.len() == 1 {
        return decoded.channels[0].clone();
    }

    let frames = decoded.frames();
    let mut out = Vec::with_capacity(frames * decoded.channels.len());
    for i in 0..frames {
        for channel in &decoded.channels {
            out.push(channel[i]);
        }
    }
    out
}

/// Serialize interleaved f32 PCM as a canonical little-endian RIFF/WAVE
/// buffer: 44-byte header, format code 1, 16-bit signed samples
///
/// Each sample is clamped to [-1, 1] and scaled asymmetrically (negative
/// values by 32768, non-negative by 32767) to cover the full signed 16-bit
/// range.
pub fn serialize_wav(interleaved: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            hound::WavWriter::new(&mut cursor, spec).context("failed to create WAV writer")?;

        for &sample in interleaved {
            let s = sample.clamp(-1.0, 1.0);
            let quantized = if s < 0.0 {
                (s * 32768.0) as i16
            } else {
                (s * 32767.0) as i16
            };
            writer
                .write_sample(quantized)
                .context("failed to write sample")?;
        }

        writer.finalize().context("failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}

/// Time-boxed re-encoder from captured containers to 16-bit WAV
///
/// Decode and serialization run on a blocking task raced against the time
/// budget. Whichever settles first wins; a late decode result is discarded.
/// Every failure mode returns `None` so the caller can upload the raw
/// captured blob instead.
pub struct WavEncoder {
    decoder: Arc<dyn AudioDecoder>,
}

impl WavEncoder {
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(SymphoniaDecoder))
    }

    pub fn with_decoder(decoder: Arc<dyn AudioDecoder>) -> Self {
        Self { decoder }
    }

    /// Re-encode `blob` to WAV within `budget`, or give up
    pub async fn encode(&self, blob: &AudioBlob, budget: Duration) -> Option<AudioBlob> {
        let decoder = Arc::clone(&self.decoder);
        let bytes = blob.bytes.clone();
        let mime_type = blob.mime_type.clone();

        let work = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let decoded = decoder.decode(&bytes, &mime_type)?;
            let channels = u16::try_from(decoded.channels.len())
                .context("too many channels")?;
            let interleaved = interleave(&decoded);
            serialize_wav(&interleaved, decoded.sample_rate, channels)
        });

        match timeout(budget, work).await {
            Ok(Ok(Ok(wav))) => {
                debug!(bytes = wav.len(), "re-encoded capture to WAV");
                Some(AudioBlob::new(wav, WAV_MIME))
            }
            Ok(Ok(Err(e))) => {
                warn!("WAV re-encode failed, keeping raw blob: {:#}", e);
                None
            }
            Ok(Err(e)) => {
                warn!("WAV re-encode task failed: {}", e);
                None
            }
            Err(_) => {
                warn!(budget_ms = budget.as_millis() as u64, "WAV re-encode exceeded budget");
                None
            }
        }
    }
}

impl Default for WavEncoder {
    fn default() -> Self {
        Self::new()
    }
}
