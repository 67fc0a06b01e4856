//! Logging configuration for athena-relay.
//!
//! Logs go to stderr so stdout carries only query output.

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info";

/// Initializes logging to stderr.
///
/// Honors `RUST_LOG`; `verbose` raises the default level to `debug`.
pub fn init_stderr_logging(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

/// Builds the filter from `RUST_LOG`, falling back to the default level.
fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("athena_relay=debug,info")
        } else {
            EnvFilter::new(DEFAULT_FILTER)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbose_filter_enables_crate_debug() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let filter = env_filter(true).to_string();
        assert!(filter.contains("athena_relay=debug"));
    }
}
