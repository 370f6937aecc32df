//! Spectrum and waveform snapshots of the graph output.
//!
//! Follows the browser `AnalyserNode` conventions so the visualization
//! reads the same numbers:
//!
//! - the last `fft_size` tap samples are Blackman-windowed and transformed
//! - bin magnitudes are `|X[k]| / N`, smoothed over time with
//!   `smoothing * previous + (1 - smoothing) * current`
//! - byte spectra map `min_decibels..=max_decibels` onto `0..=255`
//! - byte waveforms map `-1.0..=1.0` onto `0..=255` as `128 * (1 + x)`

use crate::{Error, Result};
use encore_core::{EngineConfig, TapReader};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Samples pulled from the tap per read.
const DRAIN_CHUNK: usize = 1024;

/// Analyser settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserOptions {
    /// Power of two in `32..=32768`.
    pub fft_size: usize,
    /// Time smoothing in `0.0..=1.0`.
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for AnalyserOptions {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl From<&EngineConfig> for AnalyserOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            fft_size: config.fft_size,
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
        }
    }
}

impl AnalyserOptions {
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
        if !(self.min_decibels < self.max_decibels) {
            return Err(Error::InvalidConfig(format!(
                "min_decibels {} must be below max_decibels {}",
                self.min_decibels, self.max_decibels
            )));
        }
        Ok(())
    }
}

/// Blackman window with the coefficients browsers use.
pub fn blackman_window(size: usize) -> Vec<f32> {
    const A0: f32 = 0.42;
    const A1: f32 = 0.5;
    const A2: f32 = 0.08;
    let n = size as f32;
    (0..size)
        .map(|i| {
            let x = i as f32 / n;
            A0 - A1 * (2.0 * std::f32::consts::PI * x).cos()
                + A2 * (4.0 * std::f32::consts::PI * x).cos()
        })
        .collect()
}

/// Reads the analyser tap and produces frequency and time-domain data.
pub struct Analyser {
    tap: TapReader,
    options: AnalyserOptions,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// Circular history of the most recent `fft_size` samples.
    history: Vec<f32>,
    write_pos: usize,
    /// New samples arrived since the spectrum was last computed.
    fresh: bool,
    smoothed: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    drain: Vec<f32>,
}

impl Analyser {
    pub fn new(tap: TapReader, options: AnalyserOptions) -> Result<Self> {
        options.validate()?;
        let size = options.fft_size;
        let fft = FftPlanner::<f32>::new().plan_fft_forward(size);
        let fft_scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];

        Ok(Self {
            tap,
            options,
            fft,
            window: blackman_window(size),
            history: vec![0.0; size],
            write_pos: 0,
            fresh: false,
            smoothed: vec![0.0; size / 2],
            fft_buffer: vec![Complex::new(0.0, 0.0); size],
            fft_scratch,
            drain: vec![0.0; DRAIN_CHUNK],
        })
    }

    /// Analyser with the engine's configured settings.
    pub fn from_config(tap: TapReader, config: &EngineConfig) -> Result<Self> {
        Self::new(tap, AnalyserOptions::from(config))
    }

    pub fn options(&self) -> AnalyserOptions {
        self.options
    }

    pub fn fft_size(&self) -> usize {
        self.options.fft_size
    }

    /// Half the FFT size.
    pub fn frequency_bin_count(&self) -> usize {
        self.options.fft_size / 2
    }

    /// Move everything buffered in the tap into the history.
    ///
    /// Returns the number of samples consumed. Called implicitly by every
    /// data getter.
    pub fn pull(&mut self) -> usize {
        let size = self.history.len();
        let mut total = 0;
        loop {
            let read = self.tap.read(&mut self.drain);
            if read == 0 {
                break;
            }
            for &sample in &self.drain[..read] {
                self.history[self.write_pos] = sample;
                self.write_pos = (self.write_pos + 1) % size;
            }
            total += read;
        }
        if total > 0 {
            self.fresh = true;
        }
        total
    }

    /// Smoothed spectrum in decibels. Fills `min(out.len(), bins)` entries.
    pub fn float_frequency_data(&mut self, out: &mut [f32]) {
        self.refresh_spectrum();
        for (dst, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            *dst = to_decibels(magnitude);
        }
    }

    /// Smoothed spectrum scaled to bytes. Fills `min(out.len(), bins)` entries.
    pub fn byte_frequency_data(&mut self, out: &mut [u8]) {
        self.refresh_spectrum();
        let min = self.options.min_decibels;
        let range = self.options.max_decibels - min;
        for (dst, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = to_decibels(magnitude);
            let scaled = 255.0 * (db - min) / range;
            *dst = if scaled.is_nan() {
                0
            } else {
                scaled.clamp(0.0, 255.0) as u8
            };
        }
    }

    /// Most recent samples, oldest first. Fills `min(out.len(), fft_size)` entries.
    pub fn float_time_domain_data(&mut self, out: &mut [f32]) {
        self.pull();
        let size = self.history.len();
        for (i, dst) in out.iter_mut().take(size).enumerate() {
            *dst = self.history[(self.write_pos + i) % size];
        }
    }

    /// Most recent samples as bytes, silence at 128.
    pub fn byte_time_domain_data(&mut self, out: &mut [u8]) {
        self.pull();
        let size = self.history.len();
        for (i, dst) in out.iter_mut().take(size).enumerate() {
            let sample = self.history[(self.write_pos + i) % size];
            *dst = (128.0 * (1.0 + sample)).clamp(0.0, 255.0) as u8;
        }
    }

    /// Forget all history and discard whatever is waiting in the tap.
    pub fn reset(&mut self) {
        let discarded = self.tap.clear();
        self.history.fill(0.0);
        self.smoothed.fill(0.0);
        self.write_pos = 0;
        self.fresh = false;
        tracing::trace!(discarded, "Analyser reset");
    }

    fn refresh_spectrum(&mut self) {
        self.pull();
        if !self.fresh {
            return;
        }
        self.fresh = false;

        let size = self.history.len();
        for (i, bin) in self.fft_buffer.iter_mut().enumerate() {
            let sample = self.history[(self.write_pos + i) % size];
            *bin = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.fft_scratch);

        let scale = 1.0 / size as f32;
        let tau = self.options.smoothing;
        for (smoothed, bin) in self.smoothed.iter_mut().zip(&self.fft_buffer) {
            let magnitude = bin.norm() * scale;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
        }
    }
}

#[inline]
fn to_decibels(magnitude: f32) -> f32 {
    if magnitude > 0.0 {
        20.0 * magnitude.log10()
    } else {
        f32::NEG_INFINITY
    }
}
