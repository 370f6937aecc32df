//! Playback sources feeding the head of the graph.

use crate::config::ToneConfig;
use crate::lockfree::AtomicFloat;
use std::f64::consts::TAU;
use std::sync::Arc;

/// What kind of audio a source produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    DecodedBuffer,
    SynthesizedTone,
}

/// A stereo sample generator driven by the render callback.
///
/// Implementations must not block or allocate in `next_frame`.
pub trait Source: Send {
    fn kind(&self) -> SourceKind;

    /// Next stereo frame, or `None` once the source is exhausted.
    fn next_frame(&mut self) -> Option<(f32, f32)>;
}

/// Decoded, planar stereo PCM at a fixed sample rate.
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    sample_rate: f64,
    left: Arc<[f32]>,
    right: Arc<[f32]>,
}

impl PcmBuffer {
    /// Build a buffer from planar channels. A mono track passes the same
    /// samples for both channels. The shorter channel is zero padded.
    pub fn new(sample_rate: f64, left: Vec<f32>, right: Vec<f32>) -> Self {
        let frames = left.len().max(right.len());
        let mut left = left;
        let mut right = right;
        left.resize(frames, 0.0);
        right.resize(frames, 0.0);
        Self {
            sample_rate,
            left: left.into(),
            right: right.into(),
        }
    }

    pub fn from_mono(sample_rate: f64, samples: Vec<f32>) -> Self {
        let shared: Arc<[f32]> = samples.into();
        Self {
            sample_rate,
            left: shared.clone(),
            right: shared,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }
}

/// Plays a [`PcmBuffer`] once from the start.
pub struct BufferSource {
    buffer: PcmBuffer,
    position: usize,
}

impl BufferSource {
    pub fn new(buffer: PcmBuffer) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }
}

impl Source for BufferSource {
    fn kind(&self) -> SourceKind {
        SourceKind::DecodedBuffer
    }

    #[inline]
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        let i = self.position;
        if i >= self.buffer.frames() {
            return None;
        }
        self.position += 1;
        Some((self.buffer.left[i], self.buffer.right[i]))
    }
}

/// Control-side handle for retuning a running [`ToneSource`].
#[derive(Debug, Clone)]
pub struct ToneControl {
    carrier_hz: Arc<AtomicFloat>,
}

impl ToneControl {
    pub fn set_frequency(&self, hz: f32) {
        self.carrier_hz.set(hz);
    }

    pub fn frequency(&self) -> f32 {
        self.carrier_hz.get()
    }
}

/// Endless sine carrier with a slow vibrato: the carrier frequency is
/// modulated by a low-frequency sine of fixed depth.
pub struct ToneSource {
    carrier_hz: Arc<AtomicFloat>,
    modulator_hz: f64,
    depth_hz: f64,
    amplitude: f32,
    sample_rate: f64,
    carrier_phase: f64,
    modulator_phase: f64,
}

impl ToneSource {
    /// Create a tone at `carrier_hz` and its control handle.
    pub fn new(config: &ToneConfig, carrier_hz: f32, sample_rate: f64) -> (Self, ToneControl) {
        let carrier = Arc::new(AtomicFloat::new(carrier_hz));
        let control = ToneControl {
            carrier_hz: carrier.clone(),
        };
        let source = Self {
            carrier_hz: carrier,
            modulator_hz: config.modulator_hz as f64,
            depth_hz: config.depth_hz as f64,
            amplitude: config.amplitude,
            sample_rate,
            carrier_phase: 0.0,
            modulator_phase: 0.0,
        };
        (source, control)
    }
}

impl Source for ToneSource {
    fn kind(&self) -> SourceKind {
        SourceKind::SynthesizedTone
    }

    #[inline]
    fn next_frame(&mut self) -> Option<(f32, f32)> {
        let sample = (self.carrier_phase * TAU).sin() as f32 * self.amplitude;

        let vibrato = (self.modulator_phase * TAU).sin() * self.depth_hz;
        let freq = self.carrier_hz.get() as f64 + vibrato;
        self.carrier_phase = (self.carrier_phase + freq / self.sample_rate).rem_euclid(1.0);
        self.modulator_phase =
            (self.modulator_phase + self.modulator_hz / self.sample_rate).rem_euclid(1.0);

        Some((sample, sample))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| w[0] <= 0.0 && w[1] > 0.0)
            .count()
    }

    #[test]
    fn test_buffer_source_plays_once() {
        let buffer = PcmBuffer::new(8000.0, vec![0.1, 0.2, 0.3], vec![-0.1, -0.2]);
        assert_eq!(buffer.frames(), 3);
        let mut source = BufferSource::new(buffer);
        assert_eq!(source.next_frame(), Some((0.1, -0.1)));
        assert_eq!(source.next_frame(), Some((0.2, -0.2)));
        assert_eq!(source.next_frame(), Some((0.3, 0.0)));
        assert_eq!(source.next_frame(), None);
        assert_eq!(source.next_frame(), None);
    }

    #[test]
    fn test_buffer_duration() {
        let buffer = PcmBuffer::from_mono(8000.0, vec![0.0; 4000]);
        assert_eq!(buffer.duration(), 0.5);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_tone_frequency_without_vibrato() {
        let config = ToneConfig {
            depth_hz: 0.0,
            ..Default::default()
        };
        let sample_rate = 48000.0;
        let (mut tone, _control) = ToneSource::new(&config, 440.0, sample_rate);
        let samples: Vec<f32> = (0..48000)
            .map(|_| tone.next_frame().map(|(l, _)| l).unwrap_or(0.0))
            .collect();
        let crossings = zero_crossings(&samples);
        assert!((439..=441).contains(&crossings), "got {crossings}");
    }

    #[test]
    fn test_tone_control_retunes() {
        let config = ToneConfig {
            depth_hz: 0.0,
            ..Default::default()
        };
        let (mut tone, control) = ToneSource::new(&config, 440.0, 48000.0);
        control.set_frequency(880.0);
        assert_eq!(control.frequency(), 880.0);
        let samples: Vec<f32> = (0..48000)
            .map(|_| tone.next_frame().map(|(l, _)| l).unwrap_or(0.0))
            .collect();
        let crossings = zero_crossings(&samples);
        assert!((879..=881).contains(&crossings), "got {crossings}");
    }

    #[test]
    fn test_vibrato_averages_to_carrier() {
        let (mut tone, _control) = ToneSource::new(&ToneConfig::default(), 440.0, 48000.0);
        assert_eq!(tone.kind(), SourceKind::SynthesizedTone);
        // One second covers five full vibrato cycles.
        let samples: Vec<f32> = (0..48000)
            .map(|_| tone.next_frame().map(|(l, _)| l).unwrap_or(0.0))
            .collect();
        let crossings = zero_crossings(&samples);
        assert!((436..=444).contains(&crossings), "got {crossings}");
        assert!(samples.iter().all(|s| s.abs() <= 1.0));
    }
}
