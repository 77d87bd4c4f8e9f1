//! Common error types for the transcriber

use thiserror::Error;

/// Common result type for transcriber operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every pipeline stage
///
/// Every variant is terminal for the request that produced it; nothing is
/// retried.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad file extension, unknown model selector, malformed filename
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Referenced file absent at some pipeline stage
    #[error("Not found: {0}")]
    NotFound(String),

    /// Decode or inference failure, tagged with the stage that failed
    #[error("Processing failed during {stage}: {message}")]
    Processing { stage: &'static str, message: String },

    /// External renderer exited non-zero or produced no output
    #[error("External tool '{tool}' failed ({status}): {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },

    /// Stage exceeded its configured time budget
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: &'static str, seconds: u64 },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a `Processing` error from any displayable cause
    pub fn processing(stage: &'static str, cause: impl std::fmt::Display) -> Self {
        Error::Processing {
            stage,
            message: cause.to_string(),
        }
    }

    /// Short machine-readable code used in API error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Processing { .. } => "PROCESSING_FAILED",
            Error::ExternalTool { .. } => "EXTERNAL_TOOL_FAILED",
            Error::Timeout { .. } => "TIMEOUT",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }
}
