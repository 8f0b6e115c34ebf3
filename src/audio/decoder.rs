use anyhow::{bail, Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::extension_for_mime;

/// Channel-separated floating-point PCM at native sample rate
///
/// No resampling is performed; the samples come out exactly as the
/// container holds them.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// One sample vector per channel, all the same length
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// Container-to-PCM decoding capability
///
/// The WAV encoder races this against its time budget on a blocking task,
/// so implementations may take arbitrarily long without wedging the
/// pipeline.
pub trait AudioDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<DecodedAudio>;
}

/// Decoder backed by symphonia's format probe
///
/// Handles every container the capture layer can negotiate (MP3, WebM/Opus,
/// OGG/Opus, M4A, WAV) without being told which one it was handed.
#[derive(Debug, Default)]
pub struct SymphoniaDecoder;

impl AudioDecoder for SymphoniaDecoder {
    fn decode(&self, bytes: &[u8], mime_type: &str) -> Result<DecodedAudio> {
        let cursor = std::io::Cursor::new(bytes.to_vec());
        let stream = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if !mime_type.is_empty() {
            hint.with_extension(extension_for_mime(mime_type));
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .context("unrecognized audio container")?;

        let mut format = probed.format;
        let track = format
            .default_track()
            .context("container has no audio track")?;
        let track_id = track.id;

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("unsupported codec")?;

        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
        let mut channels: Vec<Vec<f32>> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                // End of stream surfaces as an unexpected EOF
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(e).context("failed to read packet"),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                // Skip over isolated corrupt packets
                Err(SymphoniaError::DecodeError(e)) => {
                    tracing::warn!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(e).context("decode failed"),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            let channel_count = spec.channels.count();
            if channels.len() < channel_count {
                channels.resize(channel_count, Vec::new());
            }

            let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buf.copy_planar_ref(decoded);

            let samples = buf.samples();
            let frames = samples.len() / channel_count;
            for (ch, out) in channels.iter_mut().enumerate().take(channel_count) {
                out.extend_from_slice(&samples[ch * frames..(ch + 1) * frames]);
            }
        }

        if channels.is_empty() || channels[0].is_empty() || sample_rate == 0 {
            bail!("no audio samples decoded");
        }

        Ok(DecodedAudio {
            channels,
            sample_rate,
        })
    }
}
