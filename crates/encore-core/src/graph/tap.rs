//! Analyser tap: a mono copy of the graph output for visualization.

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

/// Create a connected tap pair holding up to `capacity` mono samples.
pub fn tap(capacity: usize) -> (TapWriter, TapReader) {
    let (producer, consumer) = HeapRb::<f32>::new(capacity.max(1)).split();
    (TapWriter { producer }, TapReader { consumer })
}

/// Writing end of the analyser tap. Never blocks.
pub struct TapWriter {
    producer: HeapProd<f32>,
}

impl TapWriter {
    /// Push one sample, dropping it if the tap is full.
    #[inline]
    pub fn push(&mut self, sample: f32) -> bool {
        self.producer.try_push(sample).is_ok()
    }

    /// Push as many samples as fit. Returns the count written.
    pub fn push_slice(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Reading end of the analyser tap.
///
/// The render callback drops samples while the tap is full, so readers
/// should drain regularly or call [`TapReader::clear`] before resuming.
pub struct TapReader {
    consumer: HeapCons<f32>,
}

impl TapReader {
    /// Pop up to `dst.len()` samples, oldest first. Returns the count read.
    pub fn read(&mut self, dst: &mut [f32]) -> usize {
        self.consumer.pop_slice(dst)
    }

    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }

    /// Discard everything buffered so far.
    pub fn clear(&mut self) -> usize {
        self.consumer.clear()
    }
}
