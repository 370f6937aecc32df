//! Error types.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Analyser settings out of range.
    #[error("Invalid analyser configuration: {0}")]
    InvalidConfig(String),

    /// No surface was attached before starting the frame loop.
    #[error("No visualization surface attached")]
    NoSurface,

    /// The frame thread could not be spawned.
    #[error("Failed to start visualization thread: {0}")]
    Thread(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
