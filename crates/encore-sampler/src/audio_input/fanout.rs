//! Lock-free distribution of captured frames to subscribers.

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use encore_core::{AtomicFlag, AtomicFloat};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Subscriber {
    sender: Sender<(f32, f32)>,
    /// Set by the capture callback once the receiver is gone.
    closed: AtomicFlag,
}

/// Subscriber list read by the capture callback.
///
/// The callback only loads the current list and `try_send`s; subscribing and
/// pruning swap in a new list from the control side.
pub struct CaptureFanout {
    subscribers: ArcSwap<Vec<Arc<Subscriber>>>,
    peak_level: Arc<AtomicFloat>,
    dropped_samples: AtomicU32,
}

impl CaptureFanout {
    pub fn new() -> Self {
        Self {
            subscribers: ArcSwap::from_pointee(Vec::new()),
            peak_level: Arc::new(AtomicFloat::new(0.0)),
            dropped_samples: AtomicU32::new(0),
        }
    }

    pub fn subscribe(&self, capacity: usize) -> Receiver<(f32, f32)> {
        let (sender, rx) = bounded(capacity.max(1));
        let subscriber = Arc::new(Subscriber {
            sender,
            closed: AtomicFlag::new(false),
        });
        self.subscribers.rcu(|current| {
            let mut next: Vec<_> = current
                .iter()
                .filter(|s| !s.closed.get())
                .cloned()
                .collect();
            next.push(subscriber.clone());
            next
        });
        rx
    }

    /// Forget subscribers whose receivers were found dropped.
    pub fn prune(&self) {
        if self.subscribers.load().iter().any(|s| s.closed.get()) {
            self.subscribers.rcu(|current| {
                current
                    .iter()
                    .filter(|s| !s.closed.get())
                    .cloned()
                    .collect::<Vec<_>>()
            });
        }
    }

    /// Subscribers still receiving. A dropped receiver is noticed on the next push.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .load()
            .iter()
            .filter(|s| !s.closed.get())
            .count()
    }

    /// Deliver interleaved samples with `channels` per frame.
    ///
    /// Mono input is duplicated to both sides; extra channels are ignored.
    /// Safe to call from a capture callback.
    pub fn push_interleaved(&self, data: &[f32], channels: usize) {
        let channels = channels.max(1);
        let subscribers = self.subscribers.load();
        let mut peak = 0.0f32;

        for frame in data.chunks_exact(channels) {
            let left = frame[0];
            let right = if channels > 1 { frame[1] } else { frame[0] };
            peak = peak.max(left.abs()).max(right.abs());
            self.deliver(&subscribers, (left, right));
        }

        self.peak_level.set(peak);
    }

    /// Deliver already paired frames.
    pub fn push_frames(&self, frames: &[(f32, f32)]) {
        let subscribers = self.subscribers.load();
        let mut peak = 0.0f32;
        for &frame in frames {
            peak = peak.max(frame.0.abs()).max(frame.1.abs());
            self.deliver(&subscribers, frame);
        }
        self.peak_level.set(peak);
    }

    #[inline]
    fn deliver(&self, subscribers: &[Arc<Subscriber>], frame: (f32, f32)) {
        for subscriber in subscribers {
            if subscriber.closed.get() {
                continue;
            }
            match subscriber.sender.try_send(frame) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.dropped_samples.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => subscriber.closed.set(true),
            }
        }
    }

    pub fn peak_level(&self) -> f32 {
        self.peak_level.get()
    }

    pub fn peak_level_arc(&self) -> Arc<AtomicFloat> {
        Arc::clone(&self.peak_level)
    }

    pub fn dropped_samples(&self) -> u32 {
        self.dropped_samples.load(Ordering::Relaxed)
    }
}

impl Default for CaptureFanout {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_sees_every_frame() {
        let fanout = CaptureFanout::new();
        let a = fanout.subscribe(16);
        let b = fanout.subscribe(16);
        fanout.push_interleaved(&[0.1, 0.2, 0.3, 0.4], 2);

        let got_a: Vec<_> = a.try_iter().collect();
        let got_b: Vec<_> = b.try_iter().collect();
        assert_eq!(got_a, vec![(0.1, 0.2), (0.3, 0.4)]);
        assert_eq!(got_a, got_b);
    }

    #[test]
    fn test_mono_is_duplicated() {
        let fanout = CaptureFanout::new();
        let rx = fanout.subscribe(16);
        fanout.push_interleaved(&[0.5, -0.25], 1);
        assert_eq!(
            rx.try_iter().collect::<Vec<_>>(),
            vec![(0.5, 0.5), (-0.25, -0.25)]
        );
        assert_eq!(fanout.peak_level(), 0.5);
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let fanout = CaptureFanout::new();
        let keep = fanout.subscribe(4);
        let gone = fanout.subscribe(4);
        assert_eq!(fanout.subscriber_count(), 2);

        drop(gone);
        fanout.push_frames(&[(0.1, 0.1)]);
        assert_eq!(fanout.subscriber_count(), 1);
        fanout.prune();
        assert_eq!(fanout.subscribers.load().len(), 1);
        assert_eq!(keep.try_recv(), Ok((0.1, 0.1)));
    }

    #[test]
    fn test_full_queue_counts_drops() {
        let fanout = CaptureFanout::new();
        let _rx = fanout.subscribe(1);
        fanout.push_frames(&[(0.0, 0.0), (0.1, 0.1), (0.2, 0.2)]);
        assert_eq!(fanout.dropped_samples(), 2);
    }
}
