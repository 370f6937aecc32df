//! Slicing captured frames into fixed-length PCM16LE chunks.

use encore_export::float_to_i16;

/// Bytes per interleaved stereo PCM16 frame.
const FRAME_BYTES: usize = 4;

/// Accumulates stereo frames and cuts a chunk every `slice_frames`.
#[derive(Debug)]
pub struct SliceEncoder {
    slice_frames: usize,
    current: Vec<u8>,
}

impl SliceEncoder {
    /// Slices of `slice_ms` milliseconds at `sample_rate`.
    pub fn new(sample_rate: f64, slice_ms: u32) -> Self {
        let slice_frames = ((sample_rate * slice_ms as f64 / 1000.0).round() as usize).max(1);
        Self {
            slice_frames,
            current: Vec::with_capacity(slice_frames * FRAME_BYTES),
        }
    }

    pub fn slice_frames(&self) -> usize {
        self.slice_frames
    }

    /// Append one frame. Returns a finished chunk when the slice fills.
    pub fn push(&mut self, (left, right): (f32, f32)) -> Option<Vec<u8>> {
        self.current.extend_from_slice(&float_to_i16(left).to_le_bytes());
        self.current.extend_from_slice(&float_to_i16(right).to_le_bytes());
        if self.current.len() >= self.slice_frames * FRAME_BYTES {
            Some(self.take())
        } else {
            None
        }
    }

    /// Emit the partial slice, if any.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.current.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::replace(
            &mut self.current,
            Vec::with_capacity(self.slice_frames * FRAME_BYTES),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_length() {
        let encoder = SliceEncoder::new(48000.0, 100);
        assert_eq!(encoder.slice_frames(), 4800);
    }

    #[test]
    fn test_chunks_are_cut_on_slice_boundaries() {
        let mut encoder = SliceEncoder::new(1000.0, 10);
        let mut chunks = Vec::new();
        for i in 0..25 {
            if let Some(chunk) = encoder.push((i as f32 / 100.0, 0.0)) {
                chunks.push(chunk);
            }
        }
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.len() == 10 * FRAME_BYTES));

        let tail = encoder.flush().unwrap();
        assert_eq!(tail.len(), 5 * FRAME_BYTES);
        assert!(encoder.flush().is_none());
    }

    #[test]
    fn test_pcm16_little_endian() {
        let mut encoder = SliceEncoder::new(1000.0, 1);
        let chunk = encoder.push((1.0, -1.0)).unwrap();
        assert_eq!(chunk, [0xff, 0x7f, 0x01, 0x80]);
    }
}
