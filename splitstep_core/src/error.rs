//! Error types for the splitstep_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for splitstep_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A user-edited duration of 00:00
    #[error("Duration must be longer than 00:00")]
    ZeroDuration,

    /// Picker values outside 0..=59
    #[error("Duration {minutes:02}:{seconds:02} is out of range (each part must be 0-59)")]
    DurationOutOfRange { minutes: u32, seconds: u32 },

    /// Set index outside the exercise's set range
    #[error("Set index {index} is out of range for an exercise with {total} sets")]
    InvalidSetIndex { index: u32, total: u32 },

    /// No runtime available to host the countdown task
    #[error("Unable to schedule timer: {0}")]
    TimerScheduling(String),

    /// Exercise definition breaks an invariant
    #[error("Invalid exercise definition: {0}")]
    InvalidDefinition(String),

    /// Operation not allowed in the session's current phase
    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),

    /// Exercise id not present in the library
    #[error("Unknown exercise: {0}")]
    UnknownExercise(String),
}

impl Error {
    /// Message key for errors that are shown inline to the user.
    pub fn message_key(&self) -> Option<&'static str> {
        match self {
            Error::ZeroDuration => Some("error_zero_duration"),
            Error::DurationOutOfRange { .. } => Some("error_duration_out_of_range"),
            _ => None,
        }
    }

    /// Whether the error is a user-input problem the caller can recover from.
    pub fn is_validation(&self) -> bool {
        self.message_key().is_some()
    }
}
