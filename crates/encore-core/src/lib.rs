//! Real-time audio graph for the encore karaoke engine.
//!
//! # Primary API
//!
//! - [`AudioGraph`]: graph lifecycle and the fixed node chain
//!   (`source -> gain -> reverb dry/wet -> analyser tap -> output`)
//! - [`AudioHost`] / [`AudioBackend`]: where rendered audio goes
//!   ([`CpalHost`] for devices, [`ManualHost`] for offline rendering)
//! - [`EffectState`] / [`EffectCommand`]: effect parameter model
//! - [`EngineConfig`]: shared configuration
//!
//! # Feature-gated APIs
//!
//! - `"cpal"`: CPAL audio output (enabled by default)
//!
//! # Example
//!
//! ```
//! use encore_core::{AudioGraph, EngineConfig, ManualHost, PcmBuffer, BufferSource};
//!
//! let host = ManualHost::new(8000.0);
//! let mut graph = AudioGraph::new(EngineConfig::default());
//! graph.initialize(&host)?;
//!
//! let buffer = PcmBuffer::from_mono(8000.0, vec![0.5; 800]);
//! graph.set_source(Box::new(BufferSource::new(buffer)), 1)?;
//! let rendered = host.render(256);
//! assert_eq!(rendered.len(), 512);
//! # Ok::<(), encore_core::Error>(())
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod config;
pub use config::{validate_sample_rate, EngineConfig, ToneConfig};

pub mod effects;
pub use effects::{pitch_ratio, EffectCommand, EffectState};

mod callback;
pub use callback::{GraphCommand, GraphProcessor};

mod clock;
pub use clock::GraphClock;

pub mod graph;
pub use graph::reverb::{impulse_response, Convolver, Reverb};
pub use graph::source::{BufferSource, PcmBuffer, Source, SourceKind, ToneControl, ToneSource};
pub use graph::tap::{tap, TapReader, TapWriter};
pub use graph::{AudioGraph, GraphParams, GraphState, SourceStatus};

pub(crate) mod lockfree;
pub use lockfree::{AtomicCounter, AtomicFlag, AtomicFloat};

mod smooth;
pub use smooth::SmoothedValue;

pub mod output;
#[cfg(feature = "cpal")]
pub use output::{CpalBackend, CpalHost};
pub use output::{AudioBackend, AudioHost, ManualBackend, ManualHost};

// Re-exports for subsystem crates
pub use crossbeam_channel;
