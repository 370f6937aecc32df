//! Track decoding, microphone capture and recording for encore.
//!
//! - [`decode`]: in-memory audio files to graph-rate [`encore_core::PcmBuffer`]s
//! - [`audio_input`]: [`Microphone`] backends and the capture fan-out
//! - [`recording`]: time-sliced encoding of a microphone stream into a WAV clip
//!
//! # Example
//!
//! ```
//! use encore_sampler::{CaptureConstraints, Microphone, RecordingSession, VirtualMicrophone};
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mic = VirtualMicrophone::new(8000.0);
//! let stream = mic.open(&CaptureConstraints::default())?;
//! let session = RecordingSession::start(&stream, 100)?;
//! mic.push(&[(0.25, 0.25); 800]);
//!
//! let recording = session.finish().await?;
//! assert_eq!(recording.mime_type, "audio/wav");
//! # Ok::<(), encore_sampler::Error>(())
//! # }).unwrap();
//! ```

pub mod audio_input;
pub mod decode;
pub mod error;
pub mod recording;

pub use error::{Error, Result};

#[cfg(feature = "audio-input")]
pub use audio_input::{CpalMicrophone, InputDeviceInfo};
pub use audio_input::{
    CaptureConstraints, CaptureFanout, Microphone, MicrophoneStream, VirtualMicrophone,
};
pub use decode::{decode_audio, decode_track, DecodedAudio};
pub use recording::{RecorderState, Recording, RecordingSession, SliceEncoder, RECORDING_MIME_TYPE};

// Re-exports for the engine
pub use crossbeam_channel;
