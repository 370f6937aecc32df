//! Error types.

use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The container or codec could not be decoded.
    #[error("Decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    /// The media holds no playable audio.
    #[error("No audio track: {0}")]
    NoAudio(String),

    /// The user or platform refused microphone access.
    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    /// Device not found.
    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    /// Audio input error.
    #[error("Audio input error: {0}")]
    AudioInput(String),

    /// Recording error.
    #[error("Recording error: {0}")]
    Recording(String),

    /// Container assembly or resampling failed.
    #[error(transparent)]
    Export(#[from] encore_export::ExportError),

    /// Failed to enumerate devices.
    #[cfg(feature = "audio-input")]
    #[error("Failed to enumerate audio devices")]
    DevicesError(#[from] cpal::DevicesError),

    /// Failed to get device config.
    #[cfg(feature = "audio-input")]
    #[error("Failed to get audio device config")]
    DeviceConfigError(#[from] cpal::DefaultStreamConfigError),

    /// Failed to play stream.
    #[cfg(feature = "audio-input")]
    #[error("Failed to play audio stream")]
    PlayStreamError(#[from] cpal::PlayStreamError),
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
