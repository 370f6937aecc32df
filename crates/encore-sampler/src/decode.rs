//! Backing-track decoding into graph-rate PCM.

use crate::{Error, Result};
use encore_core::PcmBuffer;
use encore_export::{resample_stereo, ResampleQuality};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Planar PCM at the file's own rate.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Fold to stereo and convert to `target_rate`.
    ///
    /// Mono is duplicated; channels past the second are dropped.
    pub fn into_buffer(self, target_rate: f64) -> Result<PcmBuffer> {
        let source_rate = self.sample_rate;
        let mut channels = self.channels.into_iter();
        let left = channels.next().unwrap_or_default();
        let right = channels.next().unwrap_or_else(|| left.clone());

        let target = target_rate.round() as u32;
        let (left, right) =
            resample_stereo(&left, &right, source_rate, target, ResampleQuality::Medium)?;
        Ok(PcmBuffer::new(target as f64, left, right))
    }
}

/// Decode an in-memory audio file. `extension` is an optional format hint.
pub fn decode_audio(bytes: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;
    let (codec_params, track_id) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::NoAudio("no decodable track".into()))?;
        (track.codec_params.clone(), track.id)
    };

    let mut decoder =
        symphonia::default::get_codecs().make(&codec_params, &DecoderOptions::default())?;

    let mut sample_rate = codec_params.sample_rate;
    let mut channel_data: Vec<Vec<f32>> = Vec::new();
    let mut sample_buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::debug!("Skipping undecodable packet: {}", msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let channel_count = spec.channels.count().max(1);
        if channel_data.len() < channel_count {
            channel_data.resize(channel_count, Vec::new());
        }

        let needed = decoded.capacity() * channel_count;
        if sample_buffer.as_ref().map_or(true, |b| b.capacity() < needed) {
            sample_buffer = Some(SampleBuffer::<f32>::new(decoded.capacity() as u64, spec));
        }
        let Some(buf) = sample_buffer.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        let samples = buf.samples();
        let frames = samples.len() / channel_count;
        for (channel_index, channel) in channel_data.iter_mut().enumerate().take(channel_count) {
            channel.extend(
                samples[channel_index..]
                    .iter()
                    .step_by(channel_count)
                    .take(frames)
                    .copied(),
            );
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| Error::NoAudio("stream reports no sample rate".into()))?;
    if channel_data.first().map_or(true, Vec::is_empty) {
        return Err(Error::NoAudio("stream decoded to zero frames".into()));
    }

    Ok(DecodedAudio {
        sample_rate,
        channels: channel_data,
    })
}

/// Decode `bytes` and convert to a stereo buffer at `target_rate`.
pub fn decode_track(bytes: Vec<u8>, extension: Option<&str>, target_rate: f64) -> Result<PcmBuffer> {
    let decoded = decode_audio(bytes, extension)?;
    tracing::debug!(
        sample_rate = decoded.sample_rate,
        channels = decoded.channels.len(),
        duration = decoded.duration(),
        "Decoded track"
    );
    decoded.into_buffer(target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encore_export::{encode_wav_memory, WavConfig};

    fn sine_wav(rate: u32, frames: usize, channels: u16) -> Vec<u8> {
        let samples: Vec<f32> = (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * 220.0 * i as f32 / rate as f32).sin() * 0.5)
            .collect();
        let config = WavConfig {
            sample_rate: rate,
            channels,
        };
        encode_wav_memory(&samples, &samples, &config).unwrap()
    }

    #[test]
    fn test_decode_wav() {
        let decoded = decode_audio(sine_wav(8000, 4000, 2), Some("wav")).unwrap();
        assert_eq!(decoded.sample_rate, 8000);
        assert_eq!(decoded.channels.len(), 2);
        assert_eq!(decoded.frames(), 4000);
        assert!((decoded.duration() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_without_hint() {
        let decoded = decode_audio(sine_wav(8000, 800, 1), None).unwrap();
        assert_eq!(decoded.channels.len(), 1);
    }

    #[test]
    fn test_mono_is_duplicated() {
        let buffer = decode_track(sine_wav(8000, 800, 1), Some("wav"), 8000.0).unwrap();
        assert_eq!(buffer.frames(), 800);
        assert_eq!(buffer.left(), buffer.right());
    }

    #[test]
    fn test_resamples_to_graph_rate() {
        let buffer = decode_track(sine_wav(8000, 8000, 2), Some("wav"), 16000.0).unwrap();
        assert_eq!(buffer.sample_rate(), 16000.0);
        assert_eq!(buffer.frames(), 16000);
        assert!((buffer.duration() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_garbage_is_an_error() {
        let result = decode_audio(vec![0x42; 2048], None);
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(decode_audio(Vec::new(), Some("wav")).is_err());
    }
}
