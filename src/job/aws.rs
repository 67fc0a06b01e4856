//! AWS implementations of the query service and object store.
//!
//! `AthenaQueryService` wraps `aws-sdk-athena`; `S3ObjectStore` wraps
//! `aws-sdk-s3`. Both are built from one shared `SdkConfig` so they use the
//! same region, credentials chain and retry settings.
//!
//! # Authentication
//!
//! Credentials are resolved in the standard AWS order:
//! environment variables → shared credentials file → IAM instance profile.

use async_trait::async_trait;
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_athena::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use aws_sdk_s3::operation::get_object::GetObjectError;
use tracing::debug;

use crate::config::AwsConfig;
use crate::error::{RelayError, Result};
use crate::job::{JobState, JobStatus, ObjectStore, QueryService, StartQueryRequest};

/// Service error codes that mean the service judged the request itself.
///
/// Every other code (throttling, credentials, permissions, server faults)
/// says nothing about the query and is a transport error.
const REJECTION_CODES: &[&str] = &["InvalidRequestException"];

/// Loads the shared AWS configuration: region plus standard-mode retries.
pub async fn load_sdk_config(config: &AwsConfig) -> SdkConfig {
    let retry = RetryConfig::standard().with_max_attempts(config.max_attempts);

    let mut loader = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .retry_config(retry);

    if let Some(endpoint) = &config.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    debug!(
        "Loading AWS config for region {} ({} attempts)",
        config.region, config.max_attempts
    );
    loader.load().await
}

/// Query service backed by Amazon Athena.
#[derive(Debug, Clone)]
pub struct AthenaQueryService {
    client: aws_sdk_athena::Client,
}

impl AthenaQueryService {
    /// Creates the service from a loaded SDK config.
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_athena::Client::new(sdk_config),
        }
    }

    /// Wraps an existing client.
    pub fn from_client(client: aws_sdk_athena::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String> {
        let context = QueryExecutionContext::builder()
            .catalog(&request.catalog)
            .set_database(request.database.clone())
            .build();
        let result_config = ResultConfiguration::builder()
            .output_location(request.output_location.to_uri())
            .build();

        let output = self
            .client
            .start_query_execution()
            .query_string(&request.query)
            .query_execution_context(context)
            .result_configuration(result_config)
            .set_work_group(request.workgroup.clone())
            .send()
            .await
            .map_err(classify_sdk_error)?;

        output
            .query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| RelayError::transport("StartQueryExecution returned no execution id"))
    }

    async fn query_status(&self, execution_id: &str) -> Result<JobStatus> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(classify_sdk_error)?;

        let execution = output.query_execution().ok_or_else(|| {
            RelayError::transport(format!(
                "GetQueryExecution returned no execution for {execution_id}"
            ))
        })?;

        let status = execution.status();
        let state = match status.and_then(|s| s.state()) {
            Some(state) => convert_state(state)?,
            // No state yet means the service has not scheduled the job.
            None => JobState::Queued,
        };

        Ok(JobStatus {
            state,
            state_change_reason: status
                .and_then(|s| s.state_change_reason())
                .map(str::to_string),
            output_location: execution
                .result_configuration()
                .and_then(|c| c.output_location())
                .map(str::to_string),
        })
    }
}

/// Object store backed by Amazon S3 (or any S3-compatible service).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    /// Creates the store from a loaded SDK config.
    ///
    /// `force_path_style` is required by MinIO and LocalStack endpoints.
    pub fn new(sdk_config: &SdkConfig, force_path_style: bool) -> Self {
        let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
            .force_path_style(force_path_style)
            .build();

        Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        }
    }

    /// Wraps an existing client.
    pub fn from_client(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        let output = result.map_err(|err| classify_get_object_error(err, bucket, key))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| {
                RelayError::transport(format!(
                    "Failed to read s3://{bucket}/{key}: {}",
                    DisplayErrorContext(&e)
                ))
            })?
            .into_bytes();

        Ok(bytes.to_vec())
    }
}

/// Maps a service state onto the job state machine.
fn convert_state(state: &QueryExecutionState) -> Result<JobState> {
    match state {
        QueryExecutionState::Queued => Ok(JobState::Queued),
        QueryExecutionState::Running => Ok(JobState::Running),
        QueryExecutionState::Succeeded => Ok(JobState::Succeeded),
        QueryExecutionState::Failed => Ok(JobState::Failed),
        QueryExecutionState::Cancelled => Ok(JobState::Cancelled),
        other => JobState::parse(other.as_str()).ok_or_else(|| {
            RelayError::transport(format!("Unknown query state '{}'", other.as_str()))
        }),
    }
}

/// Maps a `GetObject` failure, keeping a missing key distinct.
fn classify_get_object_error<R>(
    err: SdkError<GetObjectError, R>,
    bucket: &str,
    key: &str,
) -> RelayError
where
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if err.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
        return RelayError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
    }
    classify_sdk_error(err)
}

/// Splits SDK failures into service rejections and transport problems.
///
/// Only rejection codes count as `Submission`; auth, throttling and server
/// errors, plus dispatch, timeout and response errors, are transport errors.
fn classify_sdk_error<E, R>(err: SdkError<E, R>) -> RelayError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let Some(service_err) = err.as_service_error() else {
        return RelayError::transport(DisplayErrorContext(&err).to_string());
    };

    let code = service_err.code().unwrap_or("Unknown");
    let message = service_err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| service_err.to_string());

    if is_rejection_code(code) {
        RelayError::submission(format!("{code}: {message}"))
    } else {
        RelayError::transport(format!("{code}: {message}"))
    }
}

fn is_rejection_code(code: &str) -> bool {
    REJECTION_CODES.contains(&code)
}
