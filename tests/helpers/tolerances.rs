//! Tolerance constants for audio testing.
//!
//! Different paths through the engine need different precision levels.

/// Floating point rounding errors (passthrough, unity gain).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// 16-bit quantization step size.
/// Use for anything that went through a WAV fixture or a recording.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;

/// Silence threshold (~-80dB).
/// Values below this are considered silent.
pub const SILENCE_THRESHOLD: f32 = 0.0001;

/// Seconds of slack for `current_time()` comparisons.
pub const TIME_EPSILON: f64 = 1e-9;
