//! Centralized error type for the encore umbrella crate.
//!
//! Wraps all subsystem errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The audio host offered no usable output.
    #[error("Audio initialization failed: {0}")]
    AudioInit(#[source] encore_core::Error),

    /// A track could not be decoded. `play()` recovers from this locally.
    #[error("Decode: {0}")]
    Decode(#[source] encore_sampler::Error),

    /// A track could not be fetched. `play()` recovers from this locally.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Microphone permission denied: {0}")]
    PermissionDenied(String),

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Not recording")]
    NotRecording,

    #[error("Already recording")]
    AlreadyRecording,

    /// A background worker exited without reporting back.
    #[error("Background task aborted")]
    TaskAborted,

    #[error(transparent)]
    Core(#[from] encore_core::Error),

    #[error("Sampler: {0}")]
    Sampler(encore_sampler::Error),

    #[error("Analysis: {0}")]
    Analysis(#[from] encore_analysis::Error),

    #[error("Export: {0}")]
    Export(#[from] encore_export::ExportError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<encore_sampler::Error> for Error {
    /// Lift the errors hosts are expected to handle to top-level variants.
    fn from(err: encore_sampler::Error) -> Self {
        match err {
            encore_sampler::Error::PermissionDenied(msg) => Error::PermissionDenied(msg),
            encore_sampler::Error::DeviceNotFound(msg) => Error::DeviceNotFound(msg),
            err @ (encore_sampler::Error::Decode(_) | encore_sampler::Error::NoAudio(_)) => {
                Error::Decode(err)
            }
            other => Error::Sampler(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
