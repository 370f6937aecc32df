//! Error types for encore-core.

use thiserror::Error;

/// Error type for encore-core operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("No audio output available: {0}")]
    NoOutput(String),

    #[error("Invalid device: {0}")]
    InvalidDevice(String),

    #[error("Audio graph is not initialized")]
    NotInitialized,

    #[error("Audio graph is closed")]
    GraphClosed,

    #[error("Audio thread is gone")]
    Disconnected,

    #[error("Audio graph command queue is full")]
    CommandQueueFull,

    #[cfg(feature = "cpal")]
    #[error("Audio device not available")]
    DeviceNotAvailable(#[from] cpal::DefaultStreamConfigError),

    #[cfg(feature = "cpal")]
    #[error("Failed to build audio stream")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to play audio stream")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[cfg(feature = "cpal")]
    #[error("Failed to enumerate devices")]
    DevicesError(#[from] cpal::DevicesError),

    #[cfg(feature = "cpal")]
    #[error("Failed to get device name")]
    DeviceNameError(#[from] cpal::DeviceNameError),
}

/// Result type alias.
pub type Result<T> = core::result::Result<T, Error>;
