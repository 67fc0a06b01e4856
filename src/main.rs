//! athena-relay - submit, poll and materialize Athena query jobs.

mod cli;
mod logging;

use std::sync::Arc;
use std::time::Duration;

use athena_relay::config::Config;
use athena_relay::error::{RelayError, Result};
use athena_relay::job::{self, MockObjectStore, MockQueryService, QueryJobRunner, WaitStrategy};
use athena_relay::output::{render_result, render_verdict};
use athena_relay::SyntaxVerdict;
use cli::{Cli, Command};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse_args();
    logging::init_stderr_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Runs the selected command and returns the process exit code.
async fn run(cli: Cli) -> Result<i32> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    config.apply_env_defaults();

    let runner = build_runner(&cli, &config).await?;

    match &cli.command {
        Command::Run { sql, timeout, .. } => {
            let format = cli.command.output_format().map_err(RelayError::config)?;
            let runner = match timeout {
                Some(secs) => with_timeout(runner, Duration::from_secs(*secs)),
                None => runner,
            };
            let result = runner.submit_and_fetch(sql).await?;
            println!("{}", render_result(&result, format)?);
            Ok(0)
        }
        Command::Check { sql } => {
            let verdict = runner.check_syntax(sql).await;
            println!("{}", render_verdict(&verdict));
            Ok(match verdict {
                SyntaxVerdict::Passed => 0,
                SyntaxVerdict::Failed(_) => 2,
                SyntaxVerdict::Unavailable(_) => 1,
            })
        }
        Command::Status { execution_id } => {
            let status = runner.status(execution_id).await?;
            match status.state_change_reason {
                Some(reason) => println!("{} ({})", status.state, reason),
                None => println!("{}", status.state),
            }
            Ok(0)
        }
    }
}

/// Builds the runner from AWS clients, or from mock services with `--mock`.
async fn build_runner(cli: &Cli, config: &Config) -> Result<QueryJobRunner> {
    if cli.mock {
        info!("Using mock query service");
        let store = Arc::new(MockObjectStore::new());
        let service = MockQueryService::new().with_object_store(store.clone());
        return QueryJobRunner::new(Arc::new(service), store, config);
    }

    info!("Connecting to Athena in {}", config.aws.region);
    job::connect(config).await
}

/// Applies a --timeout override to a polling runner.
fn with_timeout(runner: QueryJobRunner, timeout: Duration) -> QueryJobRunner {
    match runner.wait_strategy().clone() {
        WaitStrategy::Poll(policy) => {
            runner.with_wait_strategy(WaitStrategy::Poll(policy.with_timeout(timeout)))
        }
        WaitStrategy::FixedDelay(_) => runner.with_wait_strategy(WaitStrategy::FixedDelay(timeout)),
    }
}
