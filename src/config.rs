//! Configuration management for athena-relay.
//!
//! Handles loading configuration from TOML files and environment variables.
//! The resulting [`Config`] is passed explicitly to the runner at construction.

use crate::error::{RelayError, Result};
use crate::job::{OutputLocation, PollPolicy, WaitStrategy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// AWS client settings.
    #[serde(default)]
    pub aws: AwsConfig,

    /// Query service settings.
    #[serde(default)]
    pub athena: AthenaConfig,

    /// How to wait for submitted jobs.
    #[serde(default)]
    pub polling: PollingConfig,
}

/// AWS client configuration shared by all service clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    /// AWS region.
    #[serde(default = "default_region")]
    pub region: String,

    /// Maximum attempts per request in standard retry mode.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Endpoint override (LocalStack, MinIO, VPC endpoints).
    pub endpoint_url: Option<String>,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_max_attempts() -> u32 {
    10
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            max_attempts: default_max_attempts(),
            endpoint_url: None,
        }
    }
}

/// Query service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// Bucket the query service writes results into.
    #[serde(default = "default_output_bucket")]
    pub output_bucket: String,

    /// Key prefix for query results.
    #[serde(default = "default_result_prefix")]
    pub result_prefix: String,

    /// Key prefix for syntax-check (EXPLAIN) jobs.
    #[serde(default = "default_validation_prefix")]
    pub validation_prefix: String,

    /// Data catalog the query runs against.
    #[serde(default = "default_catalog")]
    pub catalog: String,

    /// Default database within the catalog.
    pub database: Option<String>,

    /// Workgroup to submit queries in.
    pub workgroup: Option<String>,
}

fn default_output_bucket() -> String {
    "llm-athena-output".to_string()
}

fn default_result_prefix() -> String {
    "athena_output".to_string()
}

fn default_validation_prefix() -> String {
    "athena_query_output".to_string()
}

fn default_catalog() -> String {
    "AwsDataCatalog".to_string()
}

impl Default for AthenaConfig {
    fn default() -> Self {
        Self {
            output_bucket: default_output_bucket(),
            result_prefix: default_result_prefix(),
            validation_prefix: default_validation_prefix(),
            catalog: default_catalog(),
            database: None,
            workgroup: None,
        }
    }
}

impl AthenaConfig {
    /// Output location for query results.
    pub fn result_location(&self) -> OutputLocation {
        OutputLocation::new(&self.output_bucket, &self.result_prefix)
    }

    /// Output location for syntax-check jobs.
    pub fn validation_location(&self) -> OutputLocation {
        OutputLocation::new(&self.output_bucket, &self.validation_prefix)
    }

    /// Applies environment variables as defaults for unset values.
    pub fn apply_env_defaults(&mut self) {
        if self.output_bucket == default_output_bucket() {
            if let Ok(bucket) = std::env::var("ATHENA_OUTPUT_BUCKET") {
                self.output_bucket = bucket;
            }
        }
        if self.database.is_none() {
            self.database = std::env::var("ATHENA_DATABASE").ok();
        }
        if self.workgroup.is_none() {
            self.workgroup = std::env::var("ATHENA_WORKGROUP").ok();
        }
    }
}

/// Job wait configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// "poll" (default) or "fixed".
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// First delay between status checks.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Backoff growth factor.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Deadline for query jobs.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Deadline for syntax-check jobs.
    #[serde(default = "default_validation_timeout_secs")]
    pub validation_timeout_secs: u64,

    /// Sleep used by the "fixed" strategy.
    #[serde(default = "default_fixed_delay_secs")]
    pub fixed_delay_secs: u64,
}

fn default_strategy() -> String {
    "poll".to_string()
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_validation_timeout_secs() -> u64 {
    30
}

fn default_fixed_delay_secs() -> u64 {
    120
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            timeout_secs: default_timeout_secs(),
            validation_timeout_secs: default_validation_timeout_secs(),
            fixed_delay_secs: default_fixed_delay_secs(),
        }
    }
}

impl PollingConfig {
    /// Builds the poll policy for query jobs.
    pub fn query_policy(&self) -> Result<PollPolicy> {
        self.policy_with_timeout(Duration::from_secs(self.timeout_secs))
    }

    /// Builds the poll policy for syntax-check jobs.
    pub fn validation_policy(&self) -> Result<PollPolicy> {
        self.policy_with_timeout(Duration::from_secs(self.validation_timeout_secs))
    }

    fn policy_with_timeout(&self, timeout: Duration) -> Result<PollPolicy> {
        if self.multiplier < 1.0 || !self.multiplier.is_finite() {
            return Err(RelayError::config(format!(
                "polling.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay_ms == 0 {
            return Err(RelayError::config("polling.initial_delay_ms must be > 0"));
        }
        if self.max_delay_ms < self.initial_delay_ms {
            return Err(RelayError::config(
                "polling.max_delay_ms must be >= polling.initial_delay_ms",
            ));
        }

        Ok(PollPolicy {
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            timeout,
        })
    }

    /// Resolves the wait strategy for query jobs.
    pub fn wait_strategy(&self) -> Result<WaitStrategy> {
        match self.strategy.to_lowercase().as_str() {
            "poll" => Ok(WaitStrategy::Poll(self.query_policy()?)),
            "fixed" => Ok(WaitStrategy::FixedDelay(Duration::from_secs(
                self.fixed_delay_secs,
            ))),
            other => Err(RelayError::config(format!(
                "Invalid polling.strategy '{other}'. Expected 'poll' or 'fixed'"
            ))),
        }
    }
}

impl Config {
    /// Returns the default config file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("athena-relay")
            .join("config.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| RelayError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    /// Parses configuration from a TOML string.
    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            RelayError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies environment variables (AWS_REGION, ATHENA_*) as defaults.
    pub fn apply_env_defaults(&mut self) {
        if self.aws.region == default_region() {
            if let Ok(region) = std::env::var("AWS_REGION") {
                self.aws.region = region;
            }
        }
        self.athena.apply_env_defaults();
    }
}
