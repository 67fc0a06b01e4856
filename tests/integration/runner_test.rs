//! Query job runner integration tests.
//!
//! Tests submission, polling and result materialization end to end.

use std::sync::Arc;
use std::time::Duration;

use athena_relay::config::Config;
use athena_relay::job::{
    JobState, JobStatus, MockObjectStore, MockQueryService, PollPolicy, QueryJobRunner,
    WaitStrategy,
};
use athena_relay::{RelayError, Value};
use pretty_assertions::assert_eq;

/// Helper to build a runner whose service writes into `store`.
fn build_runner(service: MockQueryService, store: Arc<MockObjectStore>) -> QueryJobRunner {
    let service = service.with_object_store(store.clone());
    QueryJobRunner::new(Arc::new(service), store, &Config::default()).unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_projected_columns_match_result() {
    let store = Arc::new(MockObjectStore::new());
    let csv = "\"primarytitle\",\"startyear\",\"averagerating\"\n\
               \"The Shawshank Redemption\",\"1994\",\"9.3\"\n\
               \"The Godfather\",\"1972\",\"9.2\"\n";
    let service = MockQueryService::new().with_result("FROM imdb", csv);
    let runner = build_runner(service, store);

    let result = runner
        .submit_and_fetch(
            "SELECT primarytitle, startyear, averagerating FROM imdb.title_basics LIMIT 2",
        )
        .await
        .unwrap();

    assert_eq!(
        result.column_names(),
        vec!["primarytitle", "startyear", "averagerating"]
    );
    assert_eq!(result.row_count, 2);
    assert_eq!(result.rows[1][1], Value::Int(1972));
}

#[tokio::test(start_paused = true)]
async fn test_result_key_follows_execution_id() {
    let store = Arc::new(MockObjectStore::new());
    let service = MockQueryService::new().with_execution_ids(["abc-123", "f00"]);
    let runner = build_runner(service, store.clone());

    runner.submit_and_fetch("SELECT 1").await.unwrap();
    runner.submit_and_fetch("SELECT 2").await.unwrap();

    let keys: Vec<String> = store
        .fetched_keys()
        .await
        .into_iter()
        .map(|(_, key)| key)
        .collect();
    assert_eq!(
        keys,
        vec!["athena_output/abc-123.csv", "athena_output/f00.csv"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_long_running_job_is_polled_to_completion() {
    let store = Arc::new(MockObjectStore::new());
    let mut states = vec![JobStatus::new(JobState::Queued)];
    states.extend((0..20).map(|_| JobStatus::new(JobState::Running)));
    states.push(JobStatus::new(JobState::Succeeded));
    let service = MockQueryService::new().with_job("SELECT", states, Some("n\n1\n".to_string()));
    let runner = build_runner(service, store);

    let result = runner.submit_and_fetch("SELECT 1 AS n").await.unwrap();

    assert_eq!(result.rows, vec![vec![Value::Int(1)]]);
    assert!(result.execution_time > Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_fixed_delay_depends_on_job_duration() {
    // The legacy wait assumes completion after the delay; a slower job leaves
    // no object behind yet.
    let store = Arc::new(MockObjectStore::new());
    let service = MockQueryService::new()
        .with_timed_result("fast_table", Duration::from_secs(30), "n\n1\n")
        .with_timed_result("slow_table", Duration::from_secs(300), "n\n2\n");
    let runner = build_runner(service, store)
        .with_wait_strategy(WaitStrategy::FixedDelay(Duration::from_secs(120)));

    let fast = runner
        .submit_and_fetch("SELECT n FROM fast_table")
        .await
        .unwrap();
    assert_eq!(fast.rows, vec![vec![Value::Int(1)]]);

    let err = runner
        .submit_and_fetch("SELECT n FROM slow_table")
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::ObjectNotFound { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_polling_waits_for_slow_job() {
    let store = Arc::new(MockObjectStore::new());
    let service =
        MockQueryService::new().with_timed_result("slow_table", Duration::from_secs(90), "n\n2\n");
    let runner = build_runner(service, store);

    let result = runner
        .submit_and_fetch("SELECT n FROM slow_table")
        .await
        .unwrap();

    assert_eq!(result.rows, vec![vec![Value::Int(2)]]);
    assert!(result.execution_time >= Duration::from_secs(90));
}

#[tokio::test(start_paused = true)]
async fn test_polling_reports_timeout_instead_of_fetching() {
    let store = Arc::new(MockObjectStore::new());
    let service = MockQueryService::new().never_finishes("SELECT");
    let runner = build_runner(service, store.clone()).with_wait_strategy(WaitStrategy::Poll(
        PollPolicy::default().with_timeout(Duration::from_secs(120)),
    ));

    let err = runner.submit_and_fetch("SELECT 1").await.unwrap_err();

    match err {
        RelayError::Timeout { last_state, .. } => assert_eq!(last_state, JobState::Running),
        other => panic!("Expected Timeout, got {:?}", other),
    }
    assert!(store.fetched_keys().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_submission_rejection_propagates() {
    let store = Arc::new(MockObjectStore::new());
    let service = MockQueryService::new()
        .with_rejection("DROP", "InvalidRequestException: not allowed in this workgroup");
    let runner = build_runner(service, store);

    let err = runner.submit_and_fetch("DROP TABLE movies").await.unwrap_err();
    assert!(matches!(err, RelayError::Submission(_)));
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_share_runner() {
    let store = Arc::new(MockObjectStore::new());
    let runner = build_runner(MockQueryService::new(), store);

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let runner = runner.clone();
            tokio::spawn(async move { runner.submit_and_fetch(&format!("SELECT {i}")).await })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert_eq!(result.column_names(), vec!["result"]);
    }
}
