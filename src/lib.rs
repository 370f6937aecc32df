//! # Encore - Real-time Karaoke Audio Engine
//!
//! Plays a backing track (or a demo tone) through a small effects chain,
//! records the singer, and drives a live spectrum/waveform visualization.
//!
//! ## Architecture
//!
//! Encore is an umbrella crate that coordinates:
//! - **encore-core** - Audio graph (`source -> gain -> reverb -> analyser tap -> output`),
//!   effect parameters, output hosts
//! - **encore-sampler** - Track decoding, microphone capture, recording sessions
//! - **encore-analysis** - Spectrum analyser, renderer, visualization loop
//! - **encore-export** - WAV assembly and data URLs
//!
//! ## Quick Start
//!
//! ```
//! use encore::prelude::*;
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let host = ManualHost::new(8000.0);
//! let engine = EncoreEngine::builder()
//!     .host(host.clone())
//!     .microphone(VirtualMicrophone::new(8000.0))
//!     .build()?;
//!
//! // No track: the demo tone plays
//! engine.play(None).await?;
//! engine.set_volume(0.8);
//! engine.set_pitch(2);
//! engine.set_reverb(0.5);
//!
//! let surface = shared_surface(PixelSurface::new(320, 120));
//! engine.setup_visualization(surface.clone());
//! engine.start_visualization()?;
//!
//! host.render(4000);
//! assert!(engine.current_time() > 0.0);
//!
//! engine.cleanup();
//! # Ok::<(), encore::Error>(())
//! # }).unwrap();
//! ```
//!
//! ## Feature Flags
//!
//! - `device` (default) - CPAL output and microphone
//! - `http` - fetch `http(s)://` tracks

/// Re-export of encore-core for direct access
pub use encore_core as core;

/// Re-export of encore-sampler for direct access
pub use encore_sampler as sampler;

/// Re-export of encore-analysis for direct access
pub use encore_analysis as analysis;

/// Re-export of encore-export for direct access
pub use encore_export as export;

// Core types
pub use encore_core::{
    pitch_ratio, AudioHost, EffectCommand, EffectState, EngineConfig, ManualHost, SourceKind,
    ToneConfig,
};

#[cfg(feature = "device")]
pub use encore_core::CpalHost;

// Capture and recording
pub use encore_sampler::{
    CaptureConstraints, Microphone, Recording, VirtualMicrophone, RECORDING_MIME_TYPE,
};

#[cfg(feature = "device")]
pub use encore_sampler::{CpalMicrophone, InputDeviceInfo};

// Visualization
pub use encore_analysis::{shared_surface, Color, PixelSurface, SharedSurface, Surface};

pub mod error;
pub use error::{Error, Result};

pub mod fetch;
pub use fetch::{DefaultFetcher, FetchedTrack, TrackFetcher, TrackSource};

mod builder;
mod engine;

pub use builder::EncoreEngineBuilder;
pub use engine::{EncoreEngine, EngineState};

/// Convenience prelude for common imports
pub mod prelude {
    // Main engine
    pub use crate::{EncoreEngine, EncoreEngineBuilder, EngineState, Error, Result};

    // Inputs
    pub use crate::{ManualHost, TrackSource, VirtualMicrophone};

    // Effects
    pub use crate::{EffectCommand, EffectState};

    // Outputs
    pub use crate::{shared_surface, PixelSurface, Recording, SharedSurface, Surface};

    #[cfg(feature = "device")]
    pub use crate::{CpalHost, CpalMicrophone};
}
