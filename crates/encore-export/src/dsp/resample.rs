//! Audio resampling using rubato
//!
//! Decoded tracks are converted to the graph's sample rate before playback.

use crate::error::{ExportError, Result};
use rubato::{FftFixedIn, Resampler};

/// Resampling quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleQuality {
    /// Fast resampling (lower quality)
    Fast,
    /// Balanced quality/speed (default)
    #[default]
    Medium,
    /// High quality
    High,
}

impl ResampleQuality {
    fn chunk_size(&self) -> usize {
        match self {
            ResampleQuality::Fast => 512,
            ResampleQuality::Medium => 1024,
            ResampleQuality::High => 2048,
        }
    }

    fn sub_chunks(&self) -> usize {
        match self {
            ResampleQuality::Fast => 1,
            ResampleQuality::Medium => 2,
            ResampleQuality::High => 4,
        }
    }
}

/// Convert a stereo pair from `source_rate` to `target_rate`.
///
/// The resampler's own delay is trimmed, so the output lines up with the input
/// and is `ceil(len * target / source)` frames long.
pub fn resample_stereo(
    left: &[f32],
    right: &[f32],
    source_rate: u32,
    target_rate: u32,
    quality: ResampleQuality,
) -> Result<(Vec<f32>, Vec<f32>)> {
    if source_rate == target_rate {
        return Ok((left.to_vec(), right.to_vec()));
    }

    if left.len() != right.len() {
        return Err(ExportError::InvalidData(
            "Left and right channels have different lengths".into(),
        ));
    }

    if source_rate == 0 || target_rate == 0 {
        return Err(ExportError::InvalidOptions(format!(
            "cannot resample {} Hz -> {} Hz",
            source_rate, target_rate
        )));
    }

    let chunk_size = quality.chunk_size();
    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        chunk_size,
        quality.sub_chunks(),
        2,
    )?;

    let input_frames = left.len();
    let expected_output_frames =
        (input_frames as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;
    let delay = resampler.output_delay();

    let mut output_left = Vec::with_capacity(expected_output_frames + delay + chunk_size);
    let mut output_right = Vec::with_capacity(expected_output_frames + delay + chunk_size);

    let mut chunk_left = vec![0.0f32; chunk_size];
    let mut chunk_right = vec![0.0f32; chunk_size];

    // Keep feeding (zero padded past the end) until the delayed tail is out
    let mut pos = 0;
    while output_left.len() < expected_output_frames + delay {
        let needed = resampler.input_frames_next();
        chunk_left.resize(needed, 0.0);
        chunk_right.resize(needed, 0.0);
        chunk_left.fill(0.0);
        chunk_right.fill(0.0);

        let copy = needed.min(input_frames.saturating_sub(pos));
        chunk_left[..copy].copy_from_slice(&left[pos..pos + copy]);
        chunk_right[..copy].copy_from_slice(&right[pos..pos + copy]);
        pos += copy;

        let output = resampler.process(&[&chunk_left, &chunk_right], None)?;
        output_left.extend_from_slice(&output[0]);
        output_right.extend_from_slice(&output[1]);
    }

    output_left.drain(..delay);
    output_right.drain(..delay);
    output_left.truncate(expected_output_frames);
    output_right.truncate(expected_output_frames);

    log::debug!(
        "Resampled {} frames {} Hz -> {} frames {} Hz",
        input_frames,
        source_rate,
        output_left.len(),
        target_rate
    );

    Ok((output_left, output_right))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / rate as f32).sin() * 0.5)
            .collect()
    }

    #[test]
    fn test_no_resample_needed() {
        let left = vec![0.1, 0.2, 0.3];
        let right = vec![0.4, 0.5, 0.6];
        let (l, r) = resample_stereo(&left, &right, 44100, 44100, ResampleQuality::Fast).unwrap();
        assert_eq!(l, left);
        assert_eq!(r, right);
    }

    #[test]
    fn test_output_length_follows_ratio() {
        let left = sine(440.0, 44100, 44100);
        let (l, r) =
            resample_stereo(&left, &left, 44100, 48000, ResampleQuality::Medium).unwrap();
        assert_eq!(l.len(), 48000);
        assert_eq!(r.len(), 48000);
    }

    #[test]
    fn test_preserves_level() {
        let left = sine(440.0, 48000, 24000);
        let (l, _) = resample_stereo(&left, &left, 48000, 16000, ResampleQuality::High).unwrap();
        let mid = &l[2000..6000];
        let peak = mid.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {peak}");
    }

    #[test]
    fn test_mismatched_lengths() {
        let result = resample_stereo(&[0.0; 4], &[0.0; 3], 44100, 48000, ResampleQuality::Fast);
        assert!(matches!(result, Err(ExportError::InvalidData(_))));
    }

    #[test]
    fn test_empty_input() {
        let (l, r) = resample_stereo(&[], &[], 44100, 48000, ResampleQuality::Fast).unwrap();
        assert!(l.is_empty());
        assert!(r.is_empty());
    }
}
