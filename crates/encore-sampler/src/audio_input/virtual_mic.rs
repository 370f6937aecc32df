//! In-process microphone fed by the caller.

use super::{CaptureConstraints, CaptureFanout, Microphone, MicrophoneStream};
use crate::{Error, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Available,
    Denied,
    Missing,
}

struct VirtualInner {
    sample_rate: f64,
    availability: Mutex<Availability>,
    honored: CaptureConstraints,
    live: Mutex<Weak<CaptureFanout>>,
    opens: AtomicUsize,
}

/// Microphone whose samples are pushed by the caller, for tests and for hosts
/// that capture audio themselves.
///
/// Clones share state: keep one to [`push`](VirtualMicrophone::push) frames
/// and hand another to the engine.
#[derive(Clone)]
pub struct VirtualMicrophone {
    inner: Arc<VirtualInner>,
}

impl VirtualMicrophone {
    pub fn new(sample_rate: f64) -> Self {
        Self::with_state(sample_rate, Availability::Available)
    }

    /// A microphone whose user refuses access.
    pub fn denied(sample_rate: f64) -> Self {
        Self::with_state(sample_rate, Availability::Denied)
    }

    /// A system with no capture device.
    pub fn missing(sample_rate: f64) -> Self {
        Self::with_state(sample_rate, Availability::Missing)
    }

    fn with_state(sample_rate: f64, availability: Availability) -> Self {
        Self {
            inner: Arc::new(VirtualInner {
                sample_rate,
                availability: Mutex::new(availability),
                honored: CaptureConstraints::default(),
                live: Mutex::new(Weak::new()),
                opens: AtomicUsize::new(0),
            }),
        }
    }

    /// Grant or revoke access for later `open` calls.
    pub fn set_permission(&self, granted: bool) {
        *self.inner.availability.lock() = if granted {
            Availability::Available
        } else {
            Availability::Denied
        };
    }

    /// Feed frames into the open stream. Returns `false` if none is open.
    pub fn push(&self, frames: &[(f32, f32)]) -> bool {
        match self.inner.live.lock().upgrade() {
            Some(fanout) => {
                fanout.push_frames(frames);
                true
            }
            None => false,
        }
    }

    /// Whether a stream is currently open.
    pub fn is_open(&self) -> bool {
        self.inner.live.lock().strong_count() > 0
    }

    /// How many times the device was acquired.
    pub fn open_count(&self) -> usize {
        self.inner.opens.load(Ordering::Acquire)
    }
}

/// Keeps the virtual stream's fanout alive until the stream is dropped.
struct VirtualGuard {
    _fanout: Arc<CaptureFanout>,
}

impl Microphone for VirtualMicrophone {
    fn open(&self, _constraints: &CaptureConstraints) -> Result<MicrophoneStream> {
        match *self.inner.availability.lock() {
            Availability::Available => {}
            Availability::Denied => {
                return Err(Error::PermissionDenied(
                    "virtual microphone access refused".into(),
                ))
            }
            Availability::Missing => {
                return Err(Error::DeviceNotFound("no virtual capture device".into()))
            }
        }

        let fanout = Arc::new(CaptureFanout::new());
        *self.inner.live.lock() = Arc::downgrade(&fanout);
        self.inner.opens.fetch_add(1, Ordering::AcqRel);

        Ok(MicrophoneStream::new(
            self.inner.sample_rate,
            fanout.clone(),
            self.inner.honored,
            Box::new(VirtualGuard { _fanout: fanout }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reaches_subscribers() {
        let mic = VirtualMicrophone::new(8000.0);
        assert!(!mic.push(&[(0.1, 0.1)]));

        let stream = mic.open(&CaptureConstraints::default()).unwrap();
        assert!(mic.is_open());
        assert_eq!(stream.sample_rate(), 8000.0);
        assert_eq!(stream.honored_constraints(), CaptureConstraints::default());

        let rx = stream.subscribe(8);
        assert!(mic.push(&[(0.1, 0.2), (0.3, 0.4)]));
        assert_eq!(rx.try_iter().count(), 2);
        assert_eq!(stream.peak_level(), 0.4);

        drop(stream);
        assert!(!mic.is_open());
        assert!(!mic.push(&[(0.1, 0.1)]));
    }

    #[test]
    fn test_denied_and_missing() {
        let denied = VirtualMicrophone::denied(8000.0);
        assert!(matches!(
            denied.open(&CaptureConstraints::default()),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(denied.open_count(), 0);

        denied.set_permission(true);
        assert!(denied.open(&CaptureConstraints::default()).is_ok());

        let missing = VirtualMicrophone::missing(8000.0);
        assert!(matches!(
            missing.open(&CaptureConstraints::default()),
            Err(Error::DeviceNotFound(_))
        ));
    }

    #[test]
    fn test_open_count() {
        let mic = VirtualMicrophone::new(8000.0);
        let _a = mic.open(&CaptureConstraints::default()).unwrap();
        assert_eq!(mic.open_count(), 1);
    }
}
