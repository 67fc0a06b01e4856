//! Syntax check integration tests.

use std::sync::Arc;

use athena_relay::config::Config;
use athena_relay::job::{MockObjectStore, MockQueryService, QueryJobRunner};
use athena_relay::{RelayError, SyntaxVerdict};

fn build_runner(service: MockQueryService) -> QueryJobRunner {
    QueryJobRunner::new(
        Arc::new(service),
        Arc::new(MockObjectStore::new()),
        &Config::default(),
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_valid_query_passes() {
    let runner = build_runner(MockQueryService::new());
    let verdict = runner
        .check_syntax("SELECT primarytitle FROM imdb.title_basics")
        .await;
    assert!(verdict.is_passed());
}

#[tokio::test(start_paused = true)]
async fn test_selekt_fails_with_service_text() {
    // Default mock rejects unknown leading keywords the way the service does.
    let runner = build_runner(MockQueryService::new());

    match runner.check_syntax("SELEKT 1").await {
        SyntaxVerdict::Failed(reason) => {
            assert!(!reason.is_empty());
            assert!(reason.contains("mismatched input 'SELEKT'"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_service_outage_is_not_a_syntax_error() {
    let runner =
        build_runner(MockQueryService::new().with_transport_failure("SELECT", "dns error"));

    let verdict = runner.check_syntax("SELECT 1").await;

    assert!(!verdict.is_passed());
    assert!(matches!(
        verdict,
        SyntaxVerdict::Unavailable(RelayError::Transport(_))
    ));
}
