//! WAV container encoder using hound
//!
//! Recordings arrive as time-sliced 16-bit little-endian PCM. The container
//! is only written once every slice is in, so the header always carries the
//! final data length.

use crate::error::{ExportError, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Cursor, Seek, Write};

/// Bytes per 16-bit sample.
const BYTES_PER_SAMPLE: usize = 2;

/// WAV container configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels (1 = mono, 2 = stereo)
    pub channels: u16,
}

impl Default for WavConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
        }
    }
}

impl WavConfig {
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
        }
    }

    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Size of one interleaved frame in bytes.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    fn spec(&self) -> WavSpec {
        WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(ExportError::InvalidOptions(format!(
                "unusable WAV layout: {} channels at {} Hz",
                self.channels, self.sample_rate
            )));
        }
        Ok(())
    }
}

/// Assemble a WAV file from ordered slices of interleaved PCM16LE.
///
/// An empty slice list yields a valid header-only file.
pub fn assemble_wav(chunks: &[Vec<u8>], config: &WavConfig) -> Result<Vec<u8>> {
    config.validate()?;

    let total: usize = chunks.iter().map(Vec::len).sum();
    if total % config.frame_bytes() != 0 {
        return Err(ExportError::InvalidData(format!(
            "{} PCM bytes is not a whole number of {}-byte frames",
            total,
            config.frame_bytes()
        )));
    }

    let mut buffer = Vec::with_capacity(total + 44);
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), config.spec())?;
        for pair in chunks.iter().flat_map(|c| c.chunks_exact(BYTES_PER_SAMPLE)) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }

    log::debug!(
        "Assembled WAV: {} slices, {} frames at {} Hz",
        chunks.len(),
        total / config.frame_bytes(),
        config.sample_rate
    );

    Ok(buffer)
}

/// Encode stereo audio to WAV in memory
///
/// # Arguments
/// * `left` - Left channel samples (normalized -1.0 to 1.0)
/// * `right` - Right channel samples (normalized -1.0 to 1.0)
/// * `config` - WAV configuration; mono configs downmix
pub fn encode_wav_memory(left: &[f32], right: &[f32], config: &WavConfig) -> Result<Vec<u8>> {
    config.validate()?;
    if left.len() != right.len() {
        return Err(ExportError::InvalidData(
            "Left and right channels have different lengths".into(),
        ));
    }

    let mut buffer = Vec::new();
    {
        let mut writer = WavWriter::new(Cursor::new(&mut buffer), config.spec())?;
        write_samples(&mut writer, left, right, config.channels)?;
        writer.finalize()?;
    }

    Ok(buffer)
}

fn write_samples<W: Write + Seek>(
    writer: &mut WavWriter<W>,
    left: &[f32],
    right: &[f32],
    channels: u16,
) -> Result<()> {
    for (&l, &r) in left.iter().zip(right) {
        if channels == 1 {
            writer.write_sample(float_to_i16((l + r) * 0.5))?;
            continue;
        }
        writer.write_sample(float_to_i16(l))?;
        writer.write_sample(float_to_i16(r))?;
        for _ in 2..channels {
            writer.write_sample(0i16)?;
        }
    }
    Ok(())
}

/// Convert float sample to 16-bit integer with clipping
#[inline]
pub fn float_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * 32767.0) as i16
}
