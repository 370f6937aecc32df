//! Convolution reverb with a synthesized decaying-noise impulse response.
//!
//! Uses uniformly partitioned overlap-save convolution: the impulse response
//! is split into blocks of `B` samples, each transformed once with a `2B`
//! point FFT. Every `B` input samples the newest input spectrum is pushed
//! into a frequency-domain delay line and multiplied against all partitions.
//! Latency is one block.

use rand::Rng;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Synthesize a stereo impulse response of `seconds` length.
///
/// Sample `i` of each channel is `uniform(-1, 1) * (1 - i / len)^decay`.
/// Each channel is scaled to unit energy so the wet path keeps roughly the
/// loudness of the dry path.
pub fn impulse_response<R: Rng>(
    sample_rate: f64,
    seconds: f32,
    decay: f32,
    rng: &mut R,
) -> [Vec<f32>; 2] {
    let len = ((sample_rate * seconds as f64) as usize).max(1);
    let channel = |rng: &mut R| {
        let mut samples: Vec<f32> = (0..len)
            .map(|i| {
                let envelope = (1.0 - i as f32 / len as f32).powf(decay);
                rng.gen_range(-1.0f32..=1.0) * envelope
            })
            .collect();
        let energy: f32 = samples.iter().map(|s| s * s).sum();
        if energy > 0.0 {
            let scale = energy.sqrt().recip();
            for s in &mut samples {
                *s *= scale;
            }
        }
        samples
    };
    let left = channel(rng);
    let right = channel(rng);
    [left, right]
}

/// Single-channel partitioned FFT convolver.
pub struct Convolver {
    block_size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Transformed impulse response partitions.
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input spectra.
    history: Vec<Vec<Complex<f32>>>,
    head: usize,
    /// Previous block followed by the block being filled.
    input: Vec<f32>,
    output: Vec<f32>,
    position: usize,
    spectrum: Vec<Complex<f32>>,
    accumulator: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl Convolver {
    pub fn new(impulse: &[f32], block_size: usize) -> Self {
        let block_size = block_size.max(1);
        let fft_size = block_size * 2;
        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        let mut scratch = vec![Complex::default(); scratch_len];

        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(block_size)
            .map(|chunk| {
                let mut buf = vec![Complex::default(); fft_size];
                for (dst, &src) in buf.iter_mut().zip(chunk) {
                    dst.re = src;
                }
                forward.process_with_scratch(&mut buf, &mut scratch);
                buf
            })
            .collect();
        let count = partitions.len().max(1);

        Self {
            block_size,
            forward,
            inverse,
            history: vec![vec![Complex::default(); fft_size]; count],
            partitions,
            head: 0,
            input: vec![0.0; fft_size],
            output: vec![0.0; block_size],
            position: 0,
            spectrum: vec![Complex::default(); fft_size],
            accumulator: vec![Complex::default(); fft_size],
            scratch,
        }
    }

    pub fn latency(&self) -> usize {
        self.block_size
    }

    /// Push one input sample and pull one output sample.
    #[inline]
    pub fn process(&mut self, sample: f32) -> f32 {
        let out = self.output[self.position];
        self.input[self.block_size + self.position] = sample;
        self.position += 1;
        if self.position == self.block_size {
            self.process_block();
            self.position = 0;
        }
        out
    }

    fn process_block(&mut self) {
        let n = self.block_size;
        let fft_size = n * 2;

        for (dst, &src) in self.spectrum.iter_mut().zip(&self.input) {
            *dst = Complex::new(src, 0.0);
        }
        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        let slots = self.history.len();
        self.head = (self.head + 1) % slots;
        self.history[self.head].copy_from_slice(&self.spectrum);

        self.accumulator.fill(Complex::default());
        for (p, partition) in self.partitions.iter().enumerate() {
            let past = &self.history[(self.head + slots - p) % slots];
            for ((acc, x), h) in self.accumulator.iter_mut().zip(past).zip(partition) {
                *acc += x * h;
            }
        }
        self.inverse
            .process_with_scratch(&mut self.accumulator, &mut self.scratch);

        let scale = 1.0 / fft_size as f32;
        for (dst, src) in self.output.iter_mut().zip(&self.accumulator[n..]) {
            *dst = src.re * scale;
        }

        self.input.copy_within(n.., 0);
    }
}

/// Stereo convolution reverb producing the fully wet signal.
pub struct Reverb {
    left: Convolver,
    right: Convolver,
}

impl Reverb {
    pub fn new(impulse: &[Vec<f32>; 2], block_size: usize) -> Self {
        Self {
            left: Convolver::new(&impulse[0], block_size),
            right: Convolver::new(&impulse[1], block_size),
        }
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    pub fn latency(&self) -> usize {
        self.left.latency()
    }
}
