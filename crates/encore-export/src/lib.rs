//! # Encore Export
//!
//! Turns captured audio into something a host can store or play back:
//! - **Containers**: WAV assembly from encoded PCM slices
//! - **Handles**: playable `data:` URLs for in-memory clips
//! - **DSP utilities**: sample rate conversion
//!
//! ## Feature Flags
//!
//! - `wav` (default): WAV containers via hound (pure Rust)

pub mod error;

pub mod dsp;
pub mod format;
pub mod url;

pub use error::{ExportError, Result};
pub use url::{data_url, parse_data_url, DataUrl};

#[cfg(feature = "wav")]
pub use format::wav::{assemble_wav, encode_wav_memory, float_to_i16, WavConfig};

pub use dsp::resample::{resample_stereo, ResampleQuality};
