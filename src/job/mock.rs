//! Mock query service and object store for testing.
//!
//! Provides scripted, in-memory stand-ins for the query service and the
//! object store. Scripted jobs move through a configured sequence of states,
//! one per status check, and write their result object when they succeed.
//! Timed jobs finish after a run time on the tokio clock whether or not
//! anyone checks their status.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::{RelayError, Result};
use crate::job::{JobState, JobStatus, ObjectStore, OutputLocation, QueryService, StartQueryRequest};

/// Statement keywords the default mock accepts.
const KNOWN_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "SHOW", "DESCRIBE", "VALUES", "EXPLAIN", "INSERT", "CREATE", "DROP", "ALTER",
];

/// Run time of queries the default mock accepts.
const DEFAULT_RUN_TIME: Duration = Duration::from_millis(500);

/// What the mock does with a query matching a pattern.
#[derive(Debug, Clone)]
enum Behavior {
    /// Reject at submission with a service error.
    Reject(String),
    /// Fail at submission with a transport error.
    Unreachable(String),
    /// Accept and run the job as planned.
    Accept(Plan),
}

#[derive(Debug, Clone)]
enum Plan {
    /// Move through `states`, writing `result_csv` on success.
    Scripted {
        states: Vec<JobStatus>,
        result_csv: Option<String>,
    },
    /// Run for `run_time`, then succeed with `result_csv`.
    Timed {
        run_time: Duration,
        result_csv: String,
    },
}

#[derive(Debug)]
enum Progress {
    Scripted {
        remaining: VecDeque<JobStatus>,
        result_csv: Option<String>,
        written: bool,
    },
    Timed {
        /// `None` when the run time does not fit on the clock.
        finishes_at: Option<Instant>,
        result_csv: String,
        written: bool,
    },
}

#[derive(Debug)]
struct TrackedJob {
    progress: Progress,
    output_location: OutputLocation,
    checks: usize,
}

#[derive(Debug, Default)]
struct ServiceState {
    ids: VecDeque<String>,
    counter: u64,
    submitted: Vec<StartQueryRequest>,
    jobs: HashMap<String, TrackedJob>,
}

/// A query service that returns scripted states based on query patterns.
#[derive(Debug, Default)]
pub struct MockQueryService {
    rules: Vec<(String, Behavior)>,
    objects: Option<Arc<MockObjectStore>>,
    state: Mutex<ServiceState>,
}

impl MockQueryService {
    /// Creates a mock where every query runs once and then succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes result objects of succeeded jobs into `store`.
    pub fn with_object_store(mut self, store: Arc<MockObjectStore>) -> Self {
        self.objects = Some(store);
        self
    }

    /// Hands out these execution ids first, in order.
    pub fn with_execution_ids<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state
            .get_mut()
            .ids
            .extend(ids.into_iter().map(Into::into));
        self
    }

    /// Queries containing `pattern` go through `states`, one per status check.
    ///
    /// The last state repeats once the sequence is exhausted.
    pub fn with_job(
        mut self,
        pattern: impl Into<String>,
        states: Vec<JobStatus>,
        result_csv: Option<String>,
    ) -> Self {
        self.rules
            .push((pattern.into(), Behavior::Accept(Plan::Scripted { states, result_csv })));
        self
    }

    /// Queries containing `pattern` run once, then succeed with `csv` as result.
    pub fn with_result(self, pattern: impl Into<String>, csv: impl Into<String>) -> Self {
        self.with_job(
            pattern,
            vec![
                JobStatus::new(JobState::Running),
                JobStatus::new(JobState::Succeeded),
            ],
            Some(csv.into()),
        )
    }

    /// Queries containing `pattern` run once, then fail with `reason`.
    pub fn with_failure(self, pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        self.with_job(
            pattern,
            vec![
                JobStatus::new(JobState::Running),
                JobStatus::new(JobState::Failed).with_reason(reason),
            ],
            None,
        )
    }

    /// Queries containing `pattern` run for `run_time` on the tokio clock,
    /// then succeed with `csv` as result.
    ///
    /// The result object appears when the run time elapses, even if no
    /// status check happens.
    pub fn with_timed_result(
        mut self,
        pattern: impl Into<String>,
        run_time: Duration,
        csv: impl Into<String>,
    ) -> Self {
        self.rules.push((
            pattern.into(),
            Behavior::Accept(Plan::Timed {
                run_time,
                result_csv: csv.into(),
            }),
        ));
        self
    }

    /// Queries containing `pattern` stay RUNNING forever.
    pub fn never_finishes(self, pattern: impl Into<String>) -> Self {
        self.with_job(pattern, vec![JobStatus::new(JobState::Running)], None)
    }

    /// Queries containing `pattern` are rejected at submission.
    pub fn with_rejection(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        self.rules
            .push((pattern.into(), Behavior::Reject(message.into())));
        self
    }

    /// Submissions of queries containing `pattern` fail in transport.
    pub fn with_transport_failure(
        mut self,
        pattern: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        self.rules
            .push((pattern.into(), Behavior::Unreachable(message.into())));
        self
    }

    /// Returns every accepted submission, in order.
    pub async fn submitted(&self) -> Vec<StartQueryRequest> {
        self.state.lock().await.submitted.clone()
    }

    /// Returns how many times the status of `execution_id` was checked.
    pub async fn status_checks(&self, execution_id: &str) -> usize {
        self.state
            .lock()
            .await
            .jobs
            .get(execution_id)
            .map(|job| job.checks)
            .unwrap_or(0)
    }

    fn behavior_for(&self, query: &str) -> Behavior {
        let query_lower = query.to_lowercase();

        for (pattern, behavior) in &self.rules {
            if query_lower.contains(&pattern.to_lowercase()) {
                return behavior.clone();
            }
        }

        Self::default_behavior(query)
    }

    /// Succeeds for statements starting with a known keyword, fails otherwise.
    fn default_behavior(query: &str) -> Behavior {
        let body = query
            .strip_prefix("EXPLAIN ")
            .or_else(|| query.strip_prefix("explain "))
            .unwrap_or(query)
            .trim_start();
        let offset = query.len() - body.len();
        let keyword = body.split_whitespace().next().unwrap_or_default();

        if KNOWN_KEYWORDS
            .iter()
            .any(|k| k.eq_ignore_ascii_case(keyword))
        {
            return Behavior::Accept(Plan::Timed {
                run_time: DEFAULT_RUN_TIME,
                result_csv: format!(
                    "\"result\"\n\"Mock result for: {}\"\n",
                    query.replace('"', "\"\"")
                ),
            });
        }

        Behavior::Accept(Plan::Scripted {
            states: vec![
                JobStatus::new(JobState::Running),
                JobStatus::new(JobState::Failed).with_reason(format!(
                    "line 1:{}: mismatched input '{}'. Expecting: 'SELECT', 'WITH', 'SHOW', 'DESCRIBE'",
                    offset + 1,
                    keyword
                )),
            ],
            result_csv: None,
        })
    }
}

#[async_trait]
impl QueryService for MockQueryService {
    async fn start_query(&self, request: &StartQueryRequest) -> Result<String> {
        let plan = match self.behavior_for(&request.query) {
            Behavior::Reject(msg) => return Err(RelayError::submission(msg)),
            Behavior::Unreachable(msg) => return Err(RelayError::transport(msg)),
            Behavior::Accept(plan) => plan,
        };

        let mut state = self.state.lock().await;
        let execution_id = match state.ids.pop_front() {
            Some(id) => id,
            None => {
                state.counter += 1;
                format!("mock-query-{}", state.counter)
            }
        };

        let progress = match plan {
            Plan::Scripted { states, result_csv } => Progress::Scripted {
                remaining: states.into(),
                result_csv,
                written: false,
            },
            Plan::Timed {
                run_time,
                result_csv,
            } => {
                let finishes_at = Instant::now().checked_add(run_time);
                if let (Some(_), Some(store)) = (finishes_at, &self.objects) {
                    let store = Arc::clone(store);
                    let bucket = request.output_location.bucket.clone();
                    let key = request.output_location.result_key(&execution_id);
                    let body = result_csv.clone().into_bytes();
                    tokio::spawn(async move {
                        tokio::time::sleep(run_time).await;
                        store.put(&bucket, &key, body).await;
                    });
                }
                Progress::Timed {
                    finishes_at,
                    result_csv,
                    written: false,
                }
            }
        };

        state.submitted.push(request.clone());
        state.jobs.insert(
            execution_id.clone(),
            TrackedJob {
                progress,
                output_location: request.output_location.clone(),
                checks: 0,
            },
        );

        Ok(execution_id)
    }

    async fn query_status(&self, execution_id: &str) -> Result<JobStatus> {
        let mut state = self.state.lock().await;
        let job = state.jobs.get_mut(execution_id).ok_or_else(|| {
            RelayError::submission(format!("Query execution {execution_id} was not found"))
        })?;
        job.checks += 1;

        let (status, result_csv, written) = match &mut job.progress {
            Progress::Timed {
                finishes_at,
                result_csv,
                written,
            } => {
                let status = match finishes_at {
                    Some(at) if Instant::now() >= *at => JobStatus::new(JobState::Succeeded),
                    _ => JobStatus::new(JobState::Running),
                };
                (status, Some(&*result_csv), written)
            }
            Progress::Scripted {
                remaining,
                result_csv,
                written,
            } => {
                let next = if remaining.len() > 1 {
                    remaining.pop_front()
                } else {
                    remaining.front().cloned()
                };
                let status = next.unwrap_or_else(|| JobStatus::new(JobState::Succeeded));
                (status, result_csv.as_ref(), written)
            }
        };

        if status.state == JobState::Succeeded && !*written {
            *written = true;
            if let (Some(store), Some(csv)) = (&self.objects, result_csv) {
                store
                    .put(
                        &job.output_location.bucket,
                        &job.output_location.result_key(execution_id),
                        csv.as_bytes().to_vec(),
                    )
                    .await;
            }
        }

        Ok(status.with_output_location(job.output_location.to_uri()))
    }
}

/// An in-memory object store.
#[derive(Debug, Default)]
pub struct MockObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    fetched: Mutex<Vec<(String, String)>>,
}

impl MockObjectStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an object.
    pub async fn put(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.objects
            .lock()
            .await
            .insert((bucket.to_string(), key.to_string()), body);
    }

    /// Returns every (bucket, key) read so far, including misses.
    pub async fn fetched_keys(&self) -> Vec<(String, String)> {
        self.fetched.lock().await.clone()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.fetched
            .lock()
            .await
            .push((bucket.to_string(), key.to_string()));

        self.objects
            .lock()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| RelayError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}
