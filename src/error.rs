//! Error types for athena-relay.
//!
//! Defines the main error enum used throughout the crate.

use std::time::Duration;
use thiserror::Error;

use crate::job::JobState;

/// Main error type for query job operations.
#[derive(Error, Debug)]
pub enum RelayError {
    /// The query service rejected the request (malformed query, invalid request, etc.)
    #[error("Submission error: {0}")]
    Submission(String),

    /// Network, authentication or malformed service responses.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The job did not reach a terminal state before the wait deadline.
    #[error("Query {execution_id} still {last_state} after {waited:?}")]
    Timeout {
        execution_id: String,
        waited: Duration,
        last_state: JobState,
    },

    /// The job reached the FAILED state.
    #[error("Query {execution_id} failed: {reason}")]
    QueryFailed { execution_id: String, reason: String },

    /// The job reached the CANCELLED state.
    #[error("Query {execution_id} was cancelled")]
    QueryCancelled { execution_id: String },

    /// The result object does not exist (yet).
    #[error("Result object s3://{bucket}/{key} not found")]
    ObjectNotFound { bucket: String, key: String },

    /// The result object could not be read as delimited text.
    #[error("Result parse error: {0}")]
    Parse(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Creates a submission error with the given message.
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Creates a transport error with the given message.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Creates a parse error with the given message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Submission(_) => "Submission Error",
            Self::Transport(_) => "Transport Error",
            Self::Timeout { .. } => "Timeout",
            Self::QueryFailed { .. } => "Query Failed",
            Self::QueryCancelled { .. } => "Query Cancelled",
            Self::ObjectNotFound { .. } => "Missing Result",
            Self::Parse(_) => "Parse Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Result type alias using RelayError.
pub type Result<T> = std::result::Result<T, RelayError>;
