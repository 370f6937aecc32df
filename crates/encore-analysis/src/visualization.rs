//! Visualization frame loop.
//!
//! A [`VisualizationLoop`] draws on its own thread at a fixed frame rate
//! until stopped. [`Visualizer`] owns the surface, the analyser slot and at
//! most one loop.

use crate::analyser::Analyser;
use crate::renderer::Renderer;
use crate::surface::Surface;
use crate::{Error, Result};
use encore_core::{AtomicCounter, AtomicFlag};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Surface shared between the host and the frame thread.
pub type SharedSurface = Arc<Mutex<dyn Surface>>;

/// Analyser slot. Empty while no graph is live; frames are skipped then.
pub type SharedAnalyser = Arc<Mutex<Option<Analyser>>>;

/// Wrap a surface for [`Visualizer::set_surface`].
pub fn shared_surface<S: Surface + 'static>(surface: S) -> Arc<Mutex<S>> {
    Arc::new(Mutex::new(surface))
}

/// A running frame loop. Stopped on drop.
pub struct VisualizationLoop {
    running: Arc<AtomicFlag>,
    frames: Arc<AtomicCounter>,
    handle: Option<JoinHandle<()>>,
}

impl VisualizationLoop {
    /// Spawn the frame thread. The first frame is drawn immediately.
    pub fn start(analyser: SharedAnalyser, surface: SharedSurface, frame_rate: f32) -> Result<Self> {
        if !(frame_rate > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "frame_rate {} must be positive",
                frame_rate
            )));
        }
        let period = Duration::from_secs_f64(1.0 / frame_rate as f64);
        let running = Arc::new(AtomicFlag::new(true));
        let frames = Arc::new(AtomicCounter::new(0));

        let handle = {
            let running = Arc::clone(&running);
            let frames = Arc::clone(&frames);
            std::thread::Builder::new()
                .name("encore-visualization".into())
                .spawn(move || frame_loop(analyser, surface, period, &running, &frames))?
        };

        tracing::debug!(frame_rate, "Visualization started");

        Ok(Self {
            running,
            frames,
            handle: Some(handle),
        })
    }

    /// Stop and wait for the thread. No frame is drawn after this returns.
    pub fn stop(&mut self) {
        self.running.set(false);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!("Visualization thread panicked");
            }
            tracing::debug!(frames = self.frames.get(), "Visualization stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Frames drawn so far.
    pub fn frames_drawn(&self) -> u64 {
        self.frames.get()
    }

    pub fn frame_counter(&self) -> Arc<AtomicCounter> {
        Arc::clone(&self.frames)
    }
}

impl Drop for VisualizationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

fn frame_loop(
    analyser: SharedAnalyser,
    surface: SharedSurface,
    period: Duration,
    running: &AtomicFlag,
    frames: &AtomicCounter,
) {
    let mut renderer: Option<Renderer> = None;
    let mut next = Instant::now();

    while running.get() {
        {
            let mut analyser = analyser.lock();
            if let Some(analyser) = analyser.as_mut() {
                let bins = analyser.frequency_bin_count();
                if renderer
                    .as_ref()
                    .map_or(false, |r| r.frequency_data().len() != bins)
                {
                    renderer = None;
                }
                let renderer = renderer.get_or_insert_with(|| Renderer::new(bins));
                let mut surface = surface.lock();
                renderer.render_frame(analyser, &mut *surface);
                frames.add(1);
            }
        }

        next += period;
        let now = Instant::now();
        if next > now {
            std::thread::sleep(next - now);
        } else {
            // Fell behind; don't try to catch up with a burst of frames.
            next = now;
        }
    }
}

/// Owns the drawing surface, the analyser slot and at most one frame loop.
pub struct Visualizer {
    analyser: SharedAnalyser,
    surface: Option<SharedSurface>,
    frame_rate: f32,
    active: Option<VisualizationLoop>,
    frames: Arc<AtomicCounter>,
}

impl Visualizer {
    pub fn new(frame_rate: f32) -> Self {
        Self {
            analyser: Arc::new(Mutex::new(None)),
            surface: None,
            frame_rate,
            active: None,
            frames: Arc::new(AtomicCounter::new(0)),
        }
    }

    /// Attach the surface later loops draw on. A running loop keeps its
    /// current surface until restarted.
    pub fn set_surface(&mut self, surface: SharedSurface) {
        self.surface = Some(surface);
    }

    pub fn has_surface(&self) -> bool {
        self.surface.is_some()
    }

    /// Install the analyser of a freshly initialized graph.
    pub fn set_analyser(&self, analyser: Analyser) {
        *self.analyser.lock() = Some(analyser);
    }

    /// Drop the analyser when its graph is closed.
    pub fn clear_analyser(&self) {
        self.analyser.lock().take();
    }

    /// Discard buffered analyser input, e.g. when a new source starts.
    pub fn reset_analyser(&self) {
        if let Some(analyser) = self.analyser.lock().as_mut() {
            analyser.reset();
        }
    }

    pub fn analyser(&self) -> SharedAnalyser {
        Arc::clone(&self.analyser)
    }

    /// Start the frame loop, stopping any running one first.
    pub fn start(&mut self) -> Result<()> {
        self.stop();
        let surface = self.surface.clone().ok_or(Error::NoSurface)?;
        let active = VisualizationLoop::start(self.analyser(), surface, self.frame_rate)?;
        self.frames = active.frame_counter();
        self.active = Some(active);
        Ok(())
    }

    /// Stop the frame loop. Idempotent.
    pub fn stop(&mut self) {
        if let Some(mut active) = self.active.take() {
            active.stop();
        }
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Frames drawn by the current or most recent loop.
    pub fn frames_drawn(&self) -> u64 {
        self.frames.get()
    }
}

impl std::fmt::Debug for Visualizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visualizer")
            .field("frame_rate", &self.frame_rate)
            .field("has_surface", &self.surface.is_some())
            .field("running", &self.active.is_some())
            .finish()
    }
}
