//! Tests against a real Athena workgroup.
//!
//! Set ATHENA_IT_BUCKET (and AWS credentials) to run them.

use athena_relay::config::Config;
use athena_relay::job::{self, QueryJobRunner};
use athena_relay::{SyntaxVerdict, Value};

/// Helper to create a runner against AWS, if configured.
async fn get_test_runner() -> Option<QueryJobRunner> {
    let bucket = std::env::var("ATHENA_IT_BUCKET").ok()?;
    let mut config = Config::default();
    config.athena.output_bucket = bucket;
    config.apply_env_defaults();
    job::connect(&config).await.ok()
}

#[tokio::test]
async fn test_athena_select_one() {
    let Some(runner) = get_test_runner().await else {
        eprintln!("Skipping test: ATHENA_IT_BUCKET not set");
        return;
    };

    let result = runner
        .submit_and_fetch("SELECT 1 AS num, 'hello' AS greeting")
        .await
        .unwrap();

    assert_eq!(result.column_names(), vec!["num", "greeting"]);
    assert_eq!(result.rows, vec![vec![Value::Int(1), Value::from("hello")]]);
}

#[tokio::test]
async fn test_athena_rejects_selekt() {
    let Some(runner) = get_test_runner().await else {
        eprintln!("Skipping test: ATHENA_IT_BUCKET not set");
        return;
    };

    match runner.check_syntax("SELEKT 1").await {
        SyntaxVerdict::Failed(reason) => assert!(reason.contains("SELEKT")),
        other => panic!("Expected Failed, got {:?}", other),
    }
}
