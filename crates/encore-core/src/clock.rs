//! Graph clock: frames rendered since the graph was created.

use crate::lockfree::AtomicCounter;

/// Monotonic clock advanced by the render callback.
#[derive(Debug)]
pub struct GraphClock {
    frames: AtomicCounter,
    sample_rate: f64,
}

impl GraphClock {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            frames: AtomicCounter::new(0),
            sample_rate,
        }
    }

    /// Current graph time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frames.get() as f64 / self.sample_rate
    }

    #[inline]
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    #[inline]
    pub(crate) fn advance(&self, frames: u64) {
        self.frames.add(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances() {
        let clock = GraphClock::new(48000.0);
        assert_eq!(clock.now(), 0.0);
        clock.advance(24000);
        assert_eq!(clock.frames(), 24000);
        assert_eq!(clock.now(), 0.5);
    }
}
