//! Microphone capture.
//!
//! A [`Microphone`] opens a [`MicrophoneStream`]. Every captured frame is
//! fanned out to all current subscribers, so live monitoring and the
//! recorder each see the full signal.

#[cfg(feature = "audio-input")]
mod device;
mod fanout;
mod virtual_mic;

#[cfg(feature = "audio-input")]
pub use device::{CpalMicrophone, InputDeviceInfo};
pub use fanout::CaptureFanout;
pub use virtual_mic::VirtualMicrophone;

use crate::Result;
use crossbeam_channel::Receiver;
use encore_core::AtomicFloat;
use std::sync::Arc;

/// Processing the capture backend is asked to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
    pub auto_gain_control: bool,
}

impl CaptureConstraints {
    /// Nothing requested or nothing honored.
    pub const NONE: Self = Self {
        echo_cancellation: false,
        noise_suppression: false,
        auto_gain_control: false,
    };
}

impl Default for CaptureConstraints {
    /// Voice capture: everything on.
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
            auto_gain_control: true,
        }
    }
}

/// Source of live microphone audio.
pub trait Microphone: Send + Sync {
    /// Acquire the device.
    ///
    /// Fails with [`crate::Error::PermissionDenied`] when access is refused
    /// and [`crate::Error::DeviceNotFound`] when there is nothing to open.
    fn open(&self, constraints: &CaptureConstraints) -> Result<MicrophoneStream>;
}

/// An open microphone. Capture stops when the stream is dropped.
pub struct MicrophoneStream {
    sample_rate: f64,
    fanout: Arc<CaptureFanout>,
    honored: CaptureConstraints,
    _guard: Box<dyn Send>,
}

impl MicrophoneStream {
    /// Wrap a running capture. `guard` keeps the backend alive and stops it on drop.
    pub fn new(
        sample_rate: f64,
        fanout: Arc<CaptureFanout>,
        honored: CaptureConstraints,
        guard: Box<dyn Send>,
    ) -> Self {
        Self {
            sample_rate,
            fanout,
            honored,
            _guard: guard,
        }
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Which of the requested constraints the backend applied.
    pub fn honored_constraints(&self) -> CaptureConstraints {
        self.honored
    }

    /// Receive every frame captured from now on.
    ///
    /// Frames are dropped for this subscriber while its queue is full.
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self, capacity: usize) -> Receiver<(f32, f32)> {
        self.fanout.subscribe(capacity)
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }

    /// Peak absolute level of the most recent capture block.
    pub fn peak_level(&self) -> f32 {
        self.fanout.peak_level()
    }

    pub fn peak_level_arc(&self) -> Arc<AtomicFloat> {
        self.fanout.peak_level_arc()
    }
}

impl std::fmt::Debug for MicrophoneStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MicrophoneStream")
            .field("sample_rate", &self.sample_rate)
            .field("honored", &self.honored)
            .field("subscribers", &self.fanout.subscriber_count())
            .finish()
    }
}
