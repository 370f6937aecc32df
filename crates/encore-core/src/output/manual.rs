//! Host driven explicitly by the caller, for offline rendering and tests.

use super::{AudioBackend, AudioHost};
use crate::callback::GraphProcessor;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

struct ManualInner {
    sample_rate: f64,
    available: bool,
    processor: Option<GraphProcessor>,
}

/// Output host whose "device" is pulled by calling [`ManualHost::render`].
///
/// Clones share the same backend slot, so a caller can keep one clone and
/// hand the other to the engine.
#[derive(Clone)]
pub struct ManualHost {
    inner: Arc<Mutex<ManualInner>>,
}

impl ManualHost {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManualInner {
                sample_rate,
                available: true,
                processor: None,
            })),
        }
    }

    /// A host that refuses to open an output.
    pub fn unavailable() -> Self {
        let host = Self::new(48000.0);
        host.inner.lock().available = false;
        host
    }

    pub fn sample_rate(&self) -> f64 {
        self.inner.lock().sample_rate
    }

    /// Render `frames` stereo frames, interleaved.
    ///
    /// Returns silence without advancing anything when no graph is running.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut output = vec![0.0f32; frames * 2];
        self.render_into(&mut output);
        output
    }

    pub fn render_into(&self, output: &mut [f32]) {
        let mut inner = self.inner.lock();
        match inner.processor.as_mut() {
            Some(processor) => processor.render(output),
            None => output.fill(0.0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.lock().processor.is_some()
    }
}

impl AudioHost for ManualHost {
    fn name(&self) -> &str {
        "manual"
    }

    fn open(&self) -> Result<Box<dyn AudioBackend>> {
        if !self.inner.lock().available {
            return Err(Error::NoOutput("manual host is unavailable".into()));
        }
        Ok(Box::new(ManualBackend {
            inner: self.inner.clone(),
        }))
    }
}

/// Backend handed out by [`ManualHost::open`].
pub struct ManualBackend {
    inner: Arc<Mutex<ManualInner>>,
}

impl AudioBackend for ManualBackend {
    fn sample_rate(&self) -> f64 {
        self.inner.lock().sample_rate
    }

    fn start(&mut self, processor: GraphProcessor) -> Result<()> {
        self.inner.lock().processor = Some(processor);
        Ok(())
    }

    fn stop(&mut self) {
        self.inner.lock().processor = None;
    }

    fn is_running(&self) -> bool {
        self.inner.lock().processor.is_some()
    }
}
