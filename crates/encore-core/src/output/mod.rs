//! Output hosts: where the rendered graph goes.

#[cfg(feature = "cpal")]
mod device;
mod manual;

#[cfg(feature = "cpal")]
pub use device::{CpalBackend, CpalHost};
pub use manual::{ManualBackend, ManualHost};

use crate::callback::GraphProcessor;
use crate::Result;

/// Factory for output backends.
pub trait AudioHost: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire an output. Fails with [`crate::Error::NoOutput`] when the
    /// host has nothing usable.
    fn open(&self) -> Result<Box<dyn AudioBackend>>;
}

/// A running (or ready to run) output that drives a [`GraphProcessor`].
pub trait AudioBackend: Send {
    fn sample_rate(&self) -> f64;

    fn start(&mut self, processor: GraphProcessor) -> Result<()>;

    /// Stop rendering and drop the processor. Idempotent.
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}
