//! Time-sliced recording of a microphone stream.

mod encoder;
mod session;

pub use encoder::SliceEncoder;
pub use session::{RecorderState, Recording, RecordingSession, RECORDING_MIME_TYPE};
