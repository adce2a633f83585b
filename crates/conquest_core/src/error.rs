//! Error types for the game simulation.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all game simulation errors.
///
/// Expected gameplay outcomes (a blocked dispatch, an AI with nothing to
/// do) are not errors. These variants cover loading boundaries and callers
/// that hand the simulation references it never issued.
#[derive(Debug, Error)]
pub enum GameError {
    /// Invalid building identifier.
    #[error("Invalid building ID: {0}")]
    InvalidBuildingId(usize),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Failed to read or write a file.
    #[error("I/O error on '{path}': {message}")]
    Io {
        /// Path involved in the failed operation.
        path: String,
        /// Error message.
        message: String,
    },

    /// Failed to encode or decode binary state.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Configuration values that cannot drive a simulation.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
