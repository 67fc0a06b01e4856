//! Async query job runner.
//!
//! Submits queries, waits for them to finish and materializes their results,
//! or runs an `EXPLAIN` job to validate a query without executing it.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AthenaConfig, Config};
use crate::error::{RelayError, Result};
use crate::job::{
    wait_for_terminal, JobState, JobStatus, ObjectStore, OutputLocation, PollPolicy, QueryJob,
    QueryService, StartQueryRequest, SyntaxVerdict, WaitStrategy,
};
use crate::result::QueryResult;

/// Directive that turns a query into a validation-only job.
const EXPLAIN_PREFIX: &str = "EXPLAIN ";

/// Runs query jobs against a query service and reads results from an object store.
///
/// Holds no mutable state; calls may run concurrently.
#[derive(Clone)]
pub struct QueryJobRunner {
    queries: Arc<dyn QueryService>,
    objects: Arc<dyn ObjectStore>,
    athena: AthenaConfig,
    wait: WaitStrategy,
    validation: PollPolicy,
}

impl QueryJobRunner {
    /// Creates a runner with the settings from `config`.
    pub fn new(
        queries: Arc<dyn QueryService>,
        objects: Arc<dyn ObjectStore>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            queries,
            objects,
            athena: config.athena.clone(),
            wait: config.polling.wait_strategy()?,
            validation: config.polling.validation_policy()?,
        })
    }

    /// Overrides how `submit_and_fetch` waits for jobs.
    pub fn with_wait_strategy(mut self, wait: WaitStrategy) -> Self {
        self.wait = wait;
        self
    }

    /// Overrides the poll policy used by `check_syntax`.
    pub fn with_validation_policy(mut self, policy: PollPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Returns the configured wait strategy.
    pub fn wait_strategy(&self) -> &WaitStrategy {
        &self.wait
    }

    /// Submits `query`, waits for it to finish and returns its result set.
    pub async fn submit_and_fetch(&self, query: &str) -> Result<QueryResult> {
        let start = Instant::now();
        let mut job = self
            .submit(query, self.athena.result_location())
            .await?;

        match &self.wait {
            WaitStrategy::Poll(policy) => {
                let status =
                    wait_for_terminal(self.queries.as_ref(), &job.execution_id, policy).await?;
                job.status = status.state;
                ensure_succeeded(&job, status)?;
            }
            WaitStrategy::FixedDelay(delay) => {
                warn!(
                    "Waiting a fixed {:?} for query {} without checking its status",
                    delay, job.execution_id
                );
                tokio::time::sleep(*delay).await;
            }
        }

        let mut result = self.fetch_result(&job).await?;
        result.execution_time = start.elapsed();
        result.execution_id = Some(job.execution_id);
        Ok(result)
    }

    /// Validates `query` by running it under `EXPLAIN`.
    ///
    /// Never returns an error: failures to reach the service are reported as
    /// [`SyntaxVerdict::Unavailable`] and rejections as [`SyntaxVerdict::Failed`].
    pub async fn check_syntax(&self, query: &str) -> SyntaxVerdict {
        let query = query.trim();
        if query.is_empty() {
            return SyntaxVerdict::Failed("query text is empty".to_string());
        }

        let explain = format!("{EXPLAIN_PREFIX}{query}");
        let job = match self
            .submit(&explain, self.athena.validation_location())
            .await
        {
            Ok(job) => job,
            // The service judged the query at submission time.
            Err(RelayError::Submission(msg)) => {
                info!("Syntax check rejected at submission: {}", msg);
                return SyntaxVerdict::Failed(msg);
            }
            Err(e) => {
                warn!("Syntax check could not be submitted: {}", e);
                return SyntaxVerdict::Unavailable(e);
            }
        };

        let status =
            match wait_for_terminal(self.queries.as_ref(), &job.execution_id, &self.validation)
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    warn!("Syntax check {} did not complete: {}", job.execution_id, e);
                    return SyntaxVerdict::Unavailable(e);
                }
            };

        let verdict = match status.state {
            JobState::Succeeded => SyntaxVerdict::Passed,
            JobState::Cancelled => SyntaxVerdict::Failed(
                status
                    .state_change_reason
                    .unwrap_or_else(|| "query was cancelled".to_string()),
            ),
            _ => SyntaxVerdict::Failed(
                status
                    .state_change_reason
                    .unwrap_or_else(|| "query failed without a reason".to_string()),
            ),
        };
        info!(
            "Syntax check {} finished: {}",
            job.execution_id,
            if verdict.is_passed() { "passed" } else { "failed" }
        );
        verdict
    }

    /// Returns the current status of a submitted job.
    pub async fn status(&self, execution_id: &str) -> Result<JobStatus> {
        self.queries.query_status(execution_id).await
    }

    /// Submits a query to be written under `location`.
    pub async fn submit(&self, query: &str, location: OutputLocation) -> Result<QueryJob> {
        let query = non_empty(query)?;

        let request = StartQueryRequest {
            query: query.to_string(),
            output_location: location.clone(),
            catalog: self.athena.catalog.clone(),
            database: self.athena.database.clone(),
            workgroup: self.athena.workgroup.clone(),
        };

        debug!("Submitting query: {}", query);
        let execution_id = self.queries.start_query(&request).await?;
        info!("Submitted query {} (output {})", execution_id, location);

        Ok(QueryJob {
            query: request.query,
            execution_id,
            output_location: location,
            status: JobState::Queued,
        })
    }

    /// Reads and parses the result object of a finished job.
    async fn fetch_result(&self, job: &QueryJob) -> Result<QueryResult> {
        let bucket = &job.output_location.bucket;
        let key = job.result_key();
        info!("Fetching result object s3://{}/{}", bucket, key);

        let body = self.objects.get_object(bucket, &key).await?;
        let result = QueryResult::from_csv(&body)?;
        debug!(
            "Query {} returned {} rows, {} columns",
            job.execution_id,
            result.row_count,
            result.columns.len()
        );
        Ok(result)
    }
}

impl std::fmt::Debug for QueryJobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryJobRunner")
            .field("athena", &self.athena)
            .field("wait", &self.wait)
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

/// Trims `query`, rejecting blank input before any service call.
fn non_empty(query: &str) -> Result<&str> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return Err(RelayError::submission("Query text is empty"));
    }
    Ok(trimmed)
}

/// Maps a terminal status to `Ok` only when the job succeeded.
fn ensure_succeeded(job: &QueryJob, status: JobStatus) -> Result<()> {
    match status.state {
        JobState::Succeeded => Ok(()),
        JobState::Failed => Err(RelayError::QueryFailed {
            execution_id: job.execution_id.clone(),
            reason: status
                .state_change_reason
                .unwrap_or_else(|| "no reason reported".to_string()),
        }),
        JobState::Cancelled => Err(RelayError::QueryCancelled {
            execution_id: job.execution_id.clone(),
        }),
        JobState::Queued | JobState::Running => Err(RelayError::Timeout {
            execution_id: job.execution_id.clone(),
            waited: Duration::ZERO,
            last_state: status.state,
        }),
    }
}
