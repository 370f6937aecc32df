//! Smoothed parameter values for zipper-free gain and mix changes.
//!
//! # Example
//!
//! ```
//! use encore_core::SmoothedValue;
//!
//! // 10ms ramp at 48kHz
//! let mut gain = SmoothedValue::new(1.0, 0.010, 48000.0);
//! gain.set_target(0.5);
//!
//! # let mut buffer = [1.0f32; 512];
//! for sample in buffer.iter_mut() {
//!     *sample *= gain.next_sample();
//! }
//! assert_eq!(gain.current(), 0.5);
//! ```

/// Linearly interpolates from the current value to a target over a fixed time.
#[derive(Debug, Clone)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    step: f32,
    samples_remaining: u32,
    smooth_samples: u32,
}

impl SmoothedValue {
    pub fn new(initial: f32, smooth_time_secs: f32, sample_rate: f32) -> Self {
        let smooth_samples = (smooth_time_secs * sample_rate).max(1.0) as u32;

        Self {
            current: initial,
            target: initial,
            step: 0.0,
            samples_remaining: 0,
            smooth_samples,
        }
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if (target - self.target).abs() < f32::EPSILON {
            return;
        }

        self.target = target;
        self.samples_remaining = self.smooth_samples;
        self.step = (self.target - self.current) / self.samples_remaining as f32;
    }

    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.step = 0.0;
        self.samples_remaining = 0;
    }

    /// Call once per sample in the audio callback.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        if self.samples_remaining > 0 {
            self.current += self.step;
            self.samples_remaining -= 1;

            // Snap to avoid floating point drift
            if self.samples_remaining == 0 {
                self.current = self.target;
            }
        }

        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.samples_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaches_target_exactly() {
        let mut value = SmoothedValue::new(0.0, 0.001, 10_000.0);
        value.set_target(1.0);
        assert!(value.is_smoothing());
        for _ in 0..10 {
            value.next_sample();
        }
        assert!(!value.is_smoothing());
        assert_eq!(value.current(), 1.0);
    }

    #[test]
    fn test_ramp_is_monotonic() {
        let mut value = SmoothedValue::new(1.0, 0.01, 1000.0);
        value.set_target(0.0);
        let mut previous = value.current();
        while value.is_smoothing() {
            let next = value.next_sample();
            assert!(next <= previous);
            previous = next;
        }
    }

    #[test]
    fn test_immediate() {
        let mut value = SmoothedValue::new(0.0, 0.5, 48000.0);
        value.set_immediate(0.3);
        assert_eq!(value.next_sample(), 0.3);
        assert_eq!(value.target(), 0.3);
    }
}
