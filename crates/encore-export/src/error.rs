//! Error types for encore-export

use std::io;
use thiserror::Error;

/// Export error type
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error while writing a container
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid export options
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// Resampling error
    #[error("Resampling error: {0}")]
    Resample(String),

    /// Invalid audio data
    #[error("Invalid audio data: {0}")]
    InvalidData(String),

    /// Malformed `data:` URL
    #[error("Invalid data URL: {0}")]
    InvalidUrl(String),
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

// External library errors are flattened at the API boundary

#[cfg(feature = "wav")]
impl From<hound::Error> for ExportError {
    fn from(e: hound::Error) -> Self {
        ExportError::Io(io::Error::other(e))
    }
}

impl From<rubato::ResamplerConstructionError> for ExportError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        ExportError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for ExportError {
    fn from(e: rubato::ResampleError) -> Self {
        ExportError::Resample(e.to_string())
    }
}

impl From<base64::DecodeError> for ExportError {
    fn from(e: base64::DecodeError) -> Self {
        ExportError::InvalidUrl(e.to_string())
    }
}
