//! Error types for lessonplay-engine
//!
//! None of these are fatal to the host application: callers recover by
//! falling back to the built-in voice, the placeholder asset or running
//! without persistence.

use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Errors bubbled up from the common crate
    #[error(transparent)]
    Common(#[from] lessonplay_common::Error),

    /// Database connection or query errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Remote speech synthesis failed (network, status, empty body)
    #[error("Synthesis error: {0}")]
    Synthesis(String),

    /// Synthesized audio could not be turned into a playable clip
    #[error("Audio decode error: {0}")]
    Decode(String),

    /// Audio output device errors
    #[error("Audio output error: {0}")]
    AudioOutput(String),

    /// Built-in speech engine errors
    #[error("Fallback speech error: {0}")]
    FallbackSpeech(String),

    /// Playback controller errors
    #[error("Playback error: {0}")]
    Playback(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience Result type using the engine Error
pub type Result<T> = std::result::Result<T, Error>;
