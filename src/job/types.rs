//! Job model types.
//!
//! Defines query job state, status snapshots, output locations and
//! syntax-check verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

use crate::error::{RelayError, Result};

/// Lifecycle state of a submitted query job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobState {
    /// Accepted by the service, not yet running.
    Queued,
    /// Executing.
    Running,
    /// Finished; results are available at the output location.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Cancelled before completion.
    Cancelled,
}

impl JobState {
    /// Returns true if no further transition can occur.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// Returns the state as the service spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Parses a state from its service spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Some(Self::Queued),
            "RUNNING" => Some(Self::Running),
            "SUCCEEDED" => Some(Self::Succeeded),
            "FAILED" => Some(Self::Failed),
            "CANCELLED" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A status snapshot reported by the query service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Current state.
    pub state: JobState,

    /// Explanation of the last state change, usually only set on failure.
    pub state_change_reason: Option<String>,

    /// Output location the service reports for this job.
    pub output_location: Option<String>,
}

impl JobStatus {
    /// Creates a status with the given state and no reason.
    pub fn new(state: JobState) -> Self {
        Self {
            state,
            state_change_reason: None,
            output_location: None,
        }
    }

    /// Sets the state change reason.
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.state_change_reason = Some(reason.into());
        self
    }

    /// Sets the reported output location.
    pub fn with_output_location(mut self, location: impl Into<String>) -> Self {
        self.output_location = Some(location.into());
        self
    }
}

/// Object-storage location where the query service writes results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLocation {
    /// Bucket name.
    pub bucket: String,
    /// Key prefix without leading or trailing slashes.
    pub prefix: String,
}

impl OutputLocation {
    /// Creates a location, normalizing slashes around the prefix.
    pub fn new(bucket: impl Into<String>, prefix: impl AsRef<str>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.as_ref().trim_matches('/').to_string(),
        }
    }

    /// Parses an `s3://bucket/prefix` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let url = Url::parse(uri)
            .map_err(|e| RelayError::config(format!("Invalid output location '{uri}': {e}")))?;

        if url.scheme() != "s3" {
            return Err(RelayError::config(format!(
                "Invalid scheme '{}' in output location. Expected 's3'",
                url.scheme()
            )));
        }

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| RelayError::config(format!("Output location '{uri}' has no bucket")))?;

        Ok(Self::new(bucket, url.path()))
    }

    /// Renders the location as an `s3://` URI.
    pub fn to_uri(&self) -> String {
        if self.prefix.is_empty() {
            format!("s3://{}/", self.bucket)
        } else {
            format!("s3://{}/{}", self.bucket, self.prefix)
        }
    }

    /// Key of the result object the service writes for `execution_id`.
    pub fn result_key(&self, execution_id: &str) -> String {
        if self.prefix.is_empty() {
            format!("{execution_id}.csv")
        } else {
            format!("{}/{execution_id}.csv", self.prefix)
        }
    }
}

impl fmt::Display for OutputLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

/// A query submitted to the service.
#[derive(Debug, Clone)]
pub struct QueryJob {
    /// Query text as submitted.
    pub query: String,
    /// Identifier assigned by the service.
    pub execution_id: String,
    /// Where the service writes the result.
    pub output_location: OutputLocation,
    /// Last known state.
    pub status: JobState,
}

impl QueryJob {
    /// Key of this job's result object.
    pub fn result_key(&self) -> String {
        self.output_location.result_key(&self.execution_id)
    }
}

/// Outcome of a syntax check.
#[derive(Debug)]
pub enum SyntaxVerdict {
    /// The service accepted the query.
    Passed,
    /// The service rejected the query; carries its explanation.
    Failed(String),
    /// The check could not be completed (transport error, timeout).
    /// Says nothing about the query itself.
    Unavailable(RelayError),
}

impl SyntaxVerdict {
    /// Returns true if the query passed validation.
    pub fn is_passed(&self) -> bool {
        matches!(self, Self::Passed)
    }

    /// Returns the failure explanation, if any.
    pub fn reason(&self) -> Option<String> {
        match self {
            Self::Passed => None,
            Self::Failed(reason) => Some(reason.clone()),
            Self::Unavailable(err) => Some(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn test_state_parse() {
        assert_eq!(JobState::parse("SUCCEEDED"), Some(JobState::Succeeded));
        assert_eq!(JobState::parse("running"), Some(JobState::Running));
        assert_eq!(JobState::parse("PAUSED"), None);
    }

    #[test]
    fn test_state_serde_uses_service_spelling() {
        let json = serde_json::to_string(&JobState::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }

    #[test]
    fn test_result_key_scenario() {
        let location = OutputLocation::new("llm-athena-output", "athena_output");
        assert_eq!(location.result_key("abc-123"), "athena_output/abc-123.csv");
    }

    #[test]
    fn test_result_key_for_arbitrary_ids() {
        let location = OutputLocation::new("bucket", "athena_output");
        for id in ["x", "0", "a b", "3f2c9a1e-7b44-4d1a-9a0b-5c1d2e3f4a5b", ""] {
            assert_eq!(location.result_key(id), format!("athena_output/{id}.csv"));
        }
    }

    #[test]
    fn test_prefix_slashes_normalized() {
        let location = OutputLocation::new("bucket", "athena_query_output/");
        assert_eq!(location.prefix, "athena_query_output");
        assert_eq!(location.result_key("id"), "athena_query_output/id.csv");
    }

    #[test]
    fn test_empty_prefix() {
        let location = OutputLocation::new("bucket", "");
        assert_eq!(location.result_key("id"), "id.csv");
        assert_eq!(location.to_uri(), "s3://bucket/");
    }

    #[test]
    fn test_uri_round_trip() {
        let location = OutputLocation::from_uri("s3://llm-athena-output/athena_output").unwrap();
        assert_eq!(location.bucket, "llm-athena-output");
        assert_eq!(location.prefix, "athena_output");
        assert_eq!(location.to_uri(), "s3://llm-athena-output/athena_output");
    }

    #[test]
    fn test_uri_nested_prefix() {
        let location = OutputLocation::from_uri("s3://bucket/a/b/").unwrap();
        assert_eq!(location.prefix, "a/b");
    }

    #[test]
    fn test_uri_invalid_scheme() {
        let err = OutputLocation::from_uri("https://bucket/prefix").unwrap_err();
        assert!(err.to_string().contains("Invalid scheme"));
    }

    #[test]
    fn test_verdict_reason() {
        assert_eq!(SyntaxVerdict::Passed.reason(), None);
        assert_eq!(
            SyntaxVerdict::Failed("bad".to_string()).reason(),
            Some("bad".to_string())
        );
        let unavailable = SyntaxVerdict::Unavailable(RelayError::transport("offline"));
        assert!(!unavailable.is_passed());
        assert_eq!(
            unavailable.reason(),
            Some("Transport error: offline".to_string())
        );
    }
}
