//! Engine configuration.

use crate::effects::EffectState;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Parameters of the synthesized demo tone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Carrier frequency at zero pitch shift.
    pub carrier_hz: f32,
    /// Frequency of the vibrato oscillator.
    pub modulator_hz: f32,
    /// Peak deviation of the carrier, in Hz.
    pub depth_hz: f32,
    pub amplitude: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            carrier_hz: 440.0,
            modulator_hz: 5.0,
            depth_hz: 50.0,
            amplitude: 1.0,
        }
    }
}

/// Configuration shared by every subsystem of the engine.
///
/// Every field has a default, so a partial document deserializes cleanly:
///
/// ```
/// use encore_core::EngineConfig;
///
/// let config: EngineConfig = serde_json::from_str(r#"{ "fft_size": 512 }"#).unwrap();
/// assert_eq!(config.fft_size, 512);
/// assert_eq!(config.record_slice_ms, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyser transform size (power of two).
    pub fft_size: usize,
    /// Analyser time smoothing, `0.0..=1.0`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
    /// Capacity of the analyser tap, in mono samples.
    pub tap_capacity: usize,

    /// Length of one encoded recording slice.
    pub record_slice_ms: u32,

    /// Visualization refresh rate.
    pub frame_rate: f32,

    /// Reverb impulse response length.
    pub impulse_seconds: f32,
    /// Exponent of the impulse decay envelope.
    pub impulse_decay: f32,
    /// Partition size of the convolution reverb (power of two).
    pub reverb_block_size: usize,

    /// Ramp applied to gain and reverb changes.
    pub ramp_seconds: f32,

    pub tone: ToneConfig,

    /// Effect parameters in place before the first command arrives.
    pub effects: EffectState,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            tap_capacity: 16384,
            record_slice_ms: 100,
            frame_rate: 60.0,
            impulse_seconds: 2.0,
            impulse_decay: 2.0,
            reverb_block_size: 512,
            ramp_seconds: 0.005,
            tone: ToneConfig::default(),
            effects: EffectState::default(),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two() || !(32..=32768).contains(&self.fft_size) {
            return Err(Error::InvalidConfig(format!(
                "fft_size {} must be a power of two in 32..=32768",
                self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(Error::InvalidConfig(format!(
                "smoothing {} out of range (0-1)",
                self.smoothing
            )));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(Error::InvalidConfig(format!(
                "min_decibels {} must be below max_decibels {}",
                self.min_decibels, self.max_decibels
            )));
        }
        if self.tap_capacity < self.fft_size {
            return Err(Error::InvalidConfig(format!(
                "tap_capacity {} smaller than fft_size {}",
                self.tap_capacity, self.fft_size
            )));
        }
        if self.record_slice_ms == 0 {
            return Err(Error::InvalidConfig("record_slice_ms must be positive".into()));
        }
        if !(self.frame_rate > 0.0 && self.frame_rate <= 240.0) {
            return Err(Error::InvalidConfig(format!(
                "frame_rate {} out of range (0-240 Hz]",
                self.frame_rate
            )));
        }
        if !(self.impulse_seconds > 0.0 && self.impulse_seconds <= 10.0) {
            return Err(Error::InvalidConfig(format!(
                "impulse_seconds {} out of range (0-10]",
                self.impulse_seconds
            )));
        }
        if !self.reverb_block_size.is_power_of_two() || self.reverb_block_size < 32 {
            return Err(Error::InvalidConfig(format!(
                "reverb_block_size {} must be a power of two >= 32",
                self.reverb_block_size
            )));
        }
        if self.ramp_seconds < 0.0 {
            return Err(Error::InvalidConfig("ramp_seconds must not be negative".into()));
        }
        Ok(())
    }
}

/// Reject sample rates no output device would report.
pub fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !(8000.0..=384000.0).contains(&sample_rate) {
        return Err(Error::InvalidConfig(format!(
            "sample_rate {} out of range (8000-384000 Hz)",
            sample_rate
        )));
    }
    Ok(())
}
