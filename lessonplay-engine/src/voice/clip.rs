//! Synthesized audio clips
//!
//! Turns the raw body returned by the remote engine into a playable clip.
//! The container is probed with symphonia and the playing time is read from
//! the stream; sample decoding belongs to the output.

use crate::error::{Error, Result};
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::codecs::{
    CodecParameters, CodecType, CODEC_TYPE_MP3, CODEC_TYPE_NULL, CODEC_TYPE_OPUS,
    CODEC_TYPE_PCM_ALAW, CODEC_TYPE_PCM_F32LE, CODEC_TYPE_PCM_F64LE, CODEC_TYPE_PCM_MULAW,
    CODEC_TYPE_PCM_S16LE, CODEC_TYPE_PCM_S24LE, CODEC_TYPE_PCM_S32LE, CODEC_TYPE_PCM_S8,
    CODEC_TYPE_PCM_U8, CODEC_TYPE_VORBIS,
};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Container format of a synthesized clip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Mp3,
    Wav,
    Ogg,
}

impl AudioFormat {
    fn from_codec(codec: CodecType) -> Option<Self> {
        match codec {
            CODEC_TYPE_MP3 => Some(Self::Mp3),
            CODEC_TYPE_VORBIS | CODEC_TYPE_OPUS => Some(Self::Ogg),
            CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S32LE
            | CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F64LE | CODEC_TYPE_PCM_U8
            | CODEC_TYPE_PCM_S8 | CODEC_TYPE_PCM_ALAW | CODEC_TYPE_PCM_MULAW => Some(Self::Wav),
            _ => None,
        }
    }
}

/// Playable audio produced by the remote engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClip {
    pub format: AudioFormat,
    pub bytes: Vec<u8>,
    /// Playing time read from the stream
    pub duration: Duration,
}

impl AudioClip {
    /// Validate and wrap a response body
    ///
    /// Fails on an empty buffer, an unrecognized container or a stream
    /// without audio frames, which sends the caller to the fallback engine.
    pub fn decode(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::Decode("empty audio buffer".to_string()));
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.clone())), Default::default());

        // Response bodies carry no file name; the probe reads the markers
        let hint = Hint::new();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let mut reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let format = AudioFormat::from_codec(params.codec)
            .ok_or_else(|| Error::Decode(format!("Unsupported codec: {:?}", params.codec)))?;

        let duration = match frames_duration(&params) {
            Some(duration) => duration,
            None => packets_duration(reader.as_mut(), track_id, &params)?,
        };

        if duration.is_zero() {
            return Err(Error::Decode("Audio stream has no frames".to_string()));
        }

        debug!(?format, ?duration, "Decoded synthesized clip");
        Ok(Self {
            format,
            bytes,
            duration,
        })
    }
}

/// `n_frames / sample_rate` when the container declares its length
fn frames_duration(params: &CodecParameters) -> Option<Duration> {
    let frames = params.n_frames?;
    let sample_rate = params.sample_rate.filter(|rate| *rate > 0)?;
    let nanos = u128::from(frames) * 1_000_000_000 / u128::from(sample_rate);
    Some(Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
}

/// Sum packet durations for streams without a declared length
fn packets_duration(
    reader: &mut dyn FormatReader,
    track_id: u32,
    params: &CodecParameters,
) -> Result<Duration> {
    let mut total: u64 = 0;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) if total > 0 => {
                warn!("Stopped reading clip packets: {}", e);
                break;
            }
            Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
        };
        if packet.track_id() == track_id {
            total += packet.dur;
        }
    }

    if let Some(time_base) = params.time_base {
        let time = time_base.calc_time(total);
        return Ok(Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac));
    }

    let sample_rate = params
        .sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
    Ok(Duration::from_secs_f64(total as f64 / f64::from(sample_rate)))
}
