//! athena-relay - submit, poll and materialize Athena query jobs.
//!
//! The [`job::QueryJobRunner`] submits a query, waits for the job to reach a
//! terminal state and reads the result object the service wrote, or runs an
//! `EXPLAIN` job to validate a query.

pub mod config;
pub mod error;
pub mod job;
pub mod output;
pub mod result;

pub use error::{RelayError, Result};
pub use job::{JobState, QueryJobRunner, SyntaxVerdict};
pub use result::{QueryResult, Value};
