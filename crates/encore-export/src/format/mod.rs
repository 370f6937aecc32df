//! Audio container encoders
//!
//! Each encoder is feature-gated:
//! - `wav`: WAV via hound (pure Rust)

#[cfg(feature = "wav")]
pub mod wav;
