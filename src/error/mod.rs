//! Error handling module for SmartSplit

use thiserror::Error;

use crate::ports::CodecError;

/// Main error type for SmartSplit operations
#[derive(Error, Debug)]
pub enum SplitError {
    /// Split configuration rejected before planning
    #[error("Invalid split configuration: {message}")]
    InvalidConfig { message: String },

    /// Planning produced no segments
    #[error("Segment plan is empty for duration {duration_seconds:.3}s")]
    EmptyPlan { duration_seconds: f64 },

    /// The run was cancelled by the caller
    #[error("Split operation cancelled")]
    Cancelled,

    /// A transcode engine could not run at all
    #[error("Engine {engine} failed: {message}")]
    Engine { engine: String, message: String },

    /// Platform codec primitive error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Hardware session made no progress or ran past its deadline
    #[error("Watchdog tripped: {message}")]
    Watchdog { message: String },

    /// Codec registry or media probe error
    #[error("Probe failed: {message}")]
    Probe { message: String },

    /// External transcoder process error
    #[error("Transcoder process error: {message}")]
    Transcoder { message: String },

    /// Settings error
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SplitError {
    pub fn invalid_config(message: impl Into<String>) -> Self {
        SplitError::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SplitError::Cancelled)
    }
}

/// Result type alias for SmartSplit operations
pub type SmartSplitResult<T> = std::result::Result<T, SplitError>;
