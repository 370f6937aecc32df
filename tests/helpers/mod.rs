//! Test helpers and fixtures for encore integration tests
//!
//! Every engine built here renders through a [`ManualHost`], so audio only
//! advances when a test calls `render`, and captures through a
//! [`VirtualMicrophone`] the test feeds by hand.
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (passthrough, unity gain)
//! - `INT16_EPSILON`: Anything decoded from 16-bit PCM
//! - `SILENCE_THRESHOLD` (0.0001): Silence detection (-80dB)

#![allow(dead_code)]

pub mod tolerances;

use encore::fetch::{FetchedTrack, TrackFetcher};
use encore::prelude::*;
use std::io::Cursor;
use std::time::{Duration, Instant};

/// Low rate keeps rendered buffers small and timings exact.
pub const TEST_SAMPLE_RATE: f64 = 8000.0;

/// An engine plus the handles that drive it.
pub struct Rig {
    pub engine: EncoreEngine,
    pub host: ManualHost,
    pub mic: VirtualMicrophone,
}

impl Rig {
    /// Render `frames` stereo frames and return the left channel.
    pub fn render_left(&self, frames: usize) -> Vec<f32> {
        left_channel(&self.host.render(frames))
    }
}

/// Engine on a manual host with reverb off, so output equals gain * input.
pub fn test_rig() -> Rig {
    test_rig_with(|builder| builder)
}

/// Like [`test_rig`], with extra builder configuration.
pub fn test_rig_with(configure: impl FnOnce(EncoreEngineBuilder) -> EncoreEngineBuilder) -> Rig {
    let host = ManualHost::new(TEST_SAMPLE_RATE);
    let mic = VirtualMicrophone::new(TEST_SAMPLE_RATE);
    let builder = EncoreEngine::builder()
        .host(host.clone())
        .microphone(mic.clone())
        .effects(EffectState {
            reverb_mix: 0.0,
            ..EffectState::default()
        });
    let engine = configure(builder)
        .build()
        .expect("Failed to create test engine");
    Rig { engine, host, mic }
}

/// Route engine logs to the test harness output. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Current-thread runtime for tests that mix blocking renders with async calls.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Encode mono samples as a 16-bit WAV file in memory.
pub fn wav_fixture(samples: &[f32], sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav writer");
        for &s in samples {
            let value = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value).expect("wav sample");
        }
        writer.finalize().expect("wav finalize");
    }
    cursor.into_inner()
}

/// `seconds` of constant `value` as a WAV track at the test rate.
pub fn dc_track(value: f32, seconds: f64) -> Vec<u8> {
    let frames = (TEST_SAMPLE_RATE * seconds) as usize;
    wav_fixture(&generate_dc(value, frames), TEST_SAMPLE_RATE as u32)
}

/// Read every sample of a 16-bit WAV back as floats.
pub fn read_wav(bytes: &[u8]) -> (hound::WavSpec, Vec<f32>) {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).expect("valid wav");
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .map(|s| s.expect("wav sample") as f32 / 32768.0)
        .collect();
    (spec, samples)
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Generate a DC offset signal (constant value).
pub fn generate_dc(value: f32, num_samples: usize) -> Vec<f32> {
    vec![value; num_samples]
}

/// Stereo frames with the same signal on both sides.
pub fn stereo_frames(mono: &[f32]) -> Vec<(f32, f32)> {
    mono.iter().map(|&s| (s, s)).collect()
}

/// Left channel of interleaved stereo.
pub fn left_channel(interleaved: &[f32]) -> Vec<f32> {
    interleaved.iter().step_by(2).copied().collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Assert that a signal is approximately silent (all values near zero).
pub fn assert_silence(samples: &[f32], tolerance: f32) {
    let max = peak(samples);
    assert!(
        max <= tolerance,
        "Expected silence, but peak amplitude was {}",
        max
    );
}

/// Assert that a signal has content (not silent).
pub fn assert_has_audio(samples: &[f32], min_rms: f32) {
    let r = rms(samples);
    assert!(
        r >= min_rms,
        "Expected audio content with RMS >= {}, but RMS was {}",
        min_rms,
        r
    );
}

/// Poll `condition` every millisecond until it holds or `max_wait_ms` passes.
pub fn wait_until(max_wait_ms: u64, mut condition: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}

/// Fetcher that blocks before answering, to hold a `play()` in its decode phase.
pub struct SlowFetcher {
    pub delay: Duration,
    pub bytes: Vec<u8>,
}

impl TrackFetcher for SlowFetcher {
    fn fetch(&self, _url: &str) -> encore::Result<FetchedTrack> {
        std::thread::sleep(self.delay);
        Ok(FetchedTrack {
            bytes: self.bytes.clone(),
            extension: Some("wav".into()),
        })
    }
}
