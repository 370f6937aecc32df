//! Recording session: microphone subscription, encoder thread and
//! final clip assembly.

use super::SliceEncoder;
use crate::audio_input::MicrophoneStream;
use crate::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use encore_core::{AtomicCounter, AtomicFlag};
use encore_export::{assemble_wav, data_url, WavConfig};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::oneshot;

/// Mime type of every finished [`Recording`].
pub const RECORDING_MIME_TYPE: &str = "audio/wav";

/// How long the encoder waits for a frame before rechecking its stop flag.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Seconds of capture the encoder queue can hold before frames drop.
const QUEUE_SECONDS: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Finalizing,
}

/// A finished take, owned by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Complete WAV file.
    pub data: Vec<u8>,
    /// `data:` URL of `data`, playable again as a track.
    pub url: String,
    pub mime_type: String,
    pub sample_rate: u32,
    pub channels: u16,
    /// Seconds of audio.
    pub duration: f64,
}

/// An in-progress recording.
///
/// Frames are encoded in arrival order on a dedicated thread. Dropping the
/// session without calling [`finish`](Self::finish) discards the take.
pub struct RecordingSession {
    sample_rate: u32,
    running: Arc<AtomicFlag>,
    chunks_encoded: Arc<AtomicCounter>,
    state: RecorderState,
    done: Option<oneshot::Receiver<Vec<Vec<u8>>>>,
    worker: Option<JoinHandle<()>>,
}

impl RecordingSession {
    /// Subscribe to `stream` and start encoding `slice_ms` slices.
    pub fn start(stream: &MicrophoneStream, slice_ms: u32) -> Result<Self> {
        let sample_rate = stream.sample_rate();
        let capacity = (sample_rate * QUEUE_SECONDS).ceil() as usize;
        let frames = stream.subscribe(capacity);

        let running = Arc::new(AtomicFlag::new(true));
        let chunks_encoded = Arc::new(AtomicCounter::new(0));
        let (tx, rx) = oneshot::channel();
        let encoder = SliceEncoder::new(sample_rate, slice_ms);

        let worker = {
            let running = Arc::clone(&running);
            let chunks_encoded = Arc::clone(&chunks_encoded);
            std::thread::Builder::new()
                .name("encore-recorder".into())
                .spawn(move || {
                    let chunks = encode_loop(frames, encoder, &running, &chunks_encoded);
                    // Receiver gone means the take was abandoned.
                    let _ = tx.send(chunks);
                })?
        };

        tracing::debug!(sample_rate, slice_ms, "Recording started");

        Ok(Self {
            sample_rate: sample_rate.round() as u32,
            running,
            chunks_encoded,
            state: RecorderState::Recording,
            done: Some(rx),
            worker: Some(worker),
        })
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Number of slices completed so far.
    pub fn chunks_encoded(&self) -> u64 {
        self.chunks_encoded.get()
    }

    /// Stop encoding, wait for the final slice and build the clip.
    pub async fn finish(mut self) -> Result<Recording> {
        self.state = RecorderState::Finalizing;
        self.running.set(false);

        let done = self
            .done
            .take()
            .ok_or_else(|| Error::Recording("recording already finalized".into()))?;
        let chunks = done
            .await
            .map_err(|_| Error::Recording("encoder thread exited before flushing".into()))?;
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Recorder thread panicked after flushing");
            }
        }

        let config = WavConfig::stereo(self.sample_rate);
        let pcm_bytes: usize = chunks.iter().map(Vec::len).sum();
        let frames = pcm_bytes / config.frame_bytes();
        let data = assemble_wav(&chunks, &config)?;
        let url = data_url(&data, RECORDING_MIME_TYPE);
        self.state = RecorderState::Idle;

        let duration = if self.sample_rate == 0 {
            0.0
        } else {
            frames as f64 / self.sample_rate as f64
        };
        tracing::info!(chunks = chunks.len(), duration, "Recording finalized");

        Ok(Recording {
            data,
            url,
            mime_type: RECORDING_MIME_TYPE.to_string(),
            sample_rate: config.sample_rate,
            channels: config.channels,
            duration,
        })
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        self.running.set(false);
    }
}

impl std::fmt::Debug for RecordingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingSession")
            .field("sample_rate", &self.sample_rate)
            .field("state", &self.state)
            .field("chunks_encoded", &self.chunks_encoded.get())
            .finish()
    }
}

fn encode_loop(
    frames: Receiver<(f32, f32)>,
    mut encoder: SliceEncoder,
    running: &AtomicFlag,
    chunks_encoded: &AtomicCounter,
) -> Vec<Vec<u8>> {
    let mut chunks = Vec::new();
    let accept = |chunk: Option<Vec<u8>>, chunks: &mut Vec<Vec<u8>>| {
        if let Some(chunk) = chunk {
            chunks.push(chunk);
            chunks_encoded.add(1);
        }
    };

    while running.get() {
        match frames.recv_timeout(POLL_INTERVAL) {
            Ok(frame) => accept(encoder.push(frame), &mut chunks),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    // Everything captured before the stop request belongs to the take.
    for frame in frames.try_iter() {
        accept(encoder.push(frame), &mut chunks);
    }
    accept(encoder.flush(), &mut chunks);
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_input::{CaptureConstraints, Microphone, VirtualMicrophone};
    use encore_export::parse_data_url;

    fn open(rate: f64) -> (VirtualMicrophone, MicrophoneStream) {
        let mic = VirtualMicrophone::new(rate);
        let stream = mic.open(&CaptureConstraints::default()).unwrap();
        (mic, stream)
    }

    #[tokio::test]
    async fn test_records_pushed_frames() {
        let (mic, stream) = open(8000.0);
        let session = RecordingSession::start(&stream, 100).unwrap();
        assert_eq!(session.state(), RecorderState::Recording);

        let frames: Vec<(f32, f32)> = (0..2000).map(|i| ((i as f32 * 0.01).sin(), 0.0)).collect();
        assert!(mic.push(&frames));

        let recording = session.finish().await.unwrap();
        assert_eq!(recording.mime_type, "audio/wav");
        assert_eq!(recording.channels, 2);
        assert_eq!(recording.sample_rate, 8000);
        assert!((recording.duration - 0.25).abs() < 1e-9);
        assert_eq!(&recording.data[0..4], b"RIFF");

        let parsed = parse_data_url(&recording.url).unwrap();
        assert_eq!(parsed.mime_type, "audio/wav");
        assert_eq!(parsed.data, recording.data);
    }

    #[tokio::test]
    async fn test_empty_recording_is_header_only() {
        let (_mic, stream) = open(8000.0);
        let session = RecordingSession::start(&stream, 100).unwrap();
        let recording = session.finish().await.unwrap();
        assert_eq!(recording.duration, 0.0);
        assert!(recording.data.len() < 100);
        assert_eq!(&recording.data[8..12], b"WAVE");
    }

    #[tokio::test]
    async fn test_slices_are_counted() {
        let (mic, stream) = open(1000.0);
        let session = RecordingSession::start(&stream, 100).unwrap();
        mic.push(&vec![(0.1, 0.1); 350]);

        for _ in 0..200 {
            if session.chunks_encoded() >= 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(session.chunks_encoded(), 3);

        let recording = session.finish().await.unwrap();
        assert!((recording.duration - 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_finish_unsubscribes() {
        let (mic, stream) = open(8000.0);
        let session = RecordingSession::start(&stream, 100).unwrap();
        assert_eq!(stream.subscriber_count(), 1);

        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(session.finish()).unwrap();

        // The encoder's receiver is gone; the next capture notices it.
        mic.push(&[(0.0, 0.0)]);
        assert_eq!(stream.subscriber_count(), 0);
    }

    #[test]
    fn test_dropped_session_stops_encoder() {
        let (_mic, stream) = open(8000.0);
        let mut session = RecordingSession::start(&stream, 100).unwrap();
        let worker = session.worker.take().unwrap();
        drop(session);
        worker.join().unwrap();
    }
}
