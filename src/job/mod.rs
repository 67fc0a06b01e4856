//! Query job execution against a managed query service.
//!
//! Provides trait-based interfaces for the query service and the object store
//! it writes results to, so the runner can be driven by AWS clients or by
//! in-memory doubles interchangeably.

pub mod aws;
pub mod mock;
mod poll;
mod runner;
mod types;

pub use aws::{AthenaQueryService, S3ObjectStore};
pub use mock::{MockObjectStore, MockQueryService};
pub use poll::{wait_for_terminal, Backoff, PollPolicy, WaitStrategy};
pub use runner::QueryJobRunner;
pub use types::{JobState, JobStatus, OutputLocation, QueryJob, SyntaxVerdict};

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use async_trait::async_trait;

/// Default data catalog.
pub const DEFAULT_CATALOG: &str = "AwsDataCatalog";

/// Parameters for a query submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartQueryRequest {
    /// Query text.
    pub query: String,
    /// Where the service writes the result.
    pub output_location: OutputLocation,
    /// Data catalog.
    pub catalog: String,
    /// Default database within the catalog.
    pub database: Option<String>,
    /// Workgroup to run in.
    pub workgroup: Option<String>,
}

impl StartQueryRequest {
    /// Creates a request against the default catalog.
    pub fn new(query: impl Into<String>, output_location: OutputLocation) -> Self {
        Self {
            query: query.into(),
            output_location,
            catalog: DEFAULT_CATALOG.to_string(),
            database: None,
            workgroup: None,
        }
    }
}

/// Query service operations used by the runner.
///
/// Implementations must be thread-safe so one client can serve concurrent calls.
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submits a query and returns its execution identifier.
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String>;

    /// Returns the current status of a submitted query.
    async fn query_status(&self, execution_id: &str) -> Result<JobStatus>;
}

/// Object retrieval used to read query results.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the object's bytes, or `ObjectNotFound` if the key does not exist.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;
}

/// Creates a runner backed by AWS clients built from `config`.
///
/// This is the central factory for production use.
pub async fn connect(config: &Config) -> Result<QueryJobRunner> {
    let sdk_config = aws::load_sdk_config(&config.aws).await;
    let queries = AthenaQueryService::new(&sdk_config);
    let objects = S3ObjectStore::new(&sdk_config, config.aws.endpoint_url.is_some());

    QueryJobRunner::new(Arc::new(queries), Arc::new(objects), config)
}
