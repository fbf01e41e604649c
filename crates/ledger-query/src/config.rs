//! Configuration management for the ledger query client

use serde::{Deserialize, Serialize};
use solana_sdk::native_token::LAMPORTS_PER_SOL;
use solana_sdk::pubkey::Pubkey;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use validator::Validate;

use crate::core::error::ConfigError;
use crate::failover::FetchSettings;
use crate::normalize::{FallbackMetrics, Normalizer};
use crate::pool::{parse_commitment, Endpoint, EndpointPool};
use crate::retry::RetryPolicy;
use crate::rpc_client::TOKEN_PROGRAM_ID;

/// Environment variable overriding the endpoint pool (comma-separated URLs)
pub const ENDPOINTS_ENV: &str = "LEDGER_QUERY_ENDPOINTS";

/// Public mainnet endpoints, in preference order
pub const DEFAULT_ENDPOINTS: &[&str] = &[
    "https://api.mainnet-beta.solana.com",
    "https://solana-rpc.publicnode.com",
    "https://rpc.ankr.com/solana",
];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub pool: PoolConfig,
    pub query: QuerySettings,
    pub metrics_fallback: FallbackMetrics,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PoolConfig {
    #[validate(length(min = 1))]
    pub endpoints: Vec<EndpointConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct EndpointConfig {
    #[validate(url)]
    pub url: String,
    #[serde(default = "default_commitment")]
    pub commitment: String,
    #[serde(default = "default_confirm_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub confirm_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct QuerySettings {
    #[validate(range(min = 1, max = 120))]
    pub call_timeout_secs: u64,
    #[validate(range(max = 3600))]
    pub retry_delay_secs: u64,
    pub max_cycles: Option<u32>,
    #[validate(range(min = 1))]
    pub lamports_per_unit: u64,
    #[validate(length(min = 1))]
    pub token_programs: Vec<String>,
    #[validate(range(min = 1, max = 720))]
    pub performance_sample_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub log_level: String,
    pub structured_logging: bool,
}

fn default_commitment() -> String {
    "confirmed".to_string()
}

fn default_confirm_timeout_secs() -> u64 {
    60
}

impl EndpointConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commitment: default_commitment(),
            confirm_timeout_secs: default_confirm_timeout_secs(),
        }
    }

    fn to_endpoint(&self) -> Result<Endpoint, ConfigError> {
        let commitment = parse_commitment(&self.commitment).ok_or_else(|| ConfigError::InvalidEndpoint {
            url: self.url.clone(),
            reason: format!("unknown commitment level {:?}", self.commitment),
        })?;

        Ok(Endpoint::new(self.url.trim())
            .with_commitment(commitment)
            .with_confirm_timeout(Duration::from_secs(self.confirm_timeout_secs)))
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            endpoints: DEFAULT_ENDPOINTS.iter().map(|url| EndpointConfig::new(*url)).collect(),
        }
    }
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            call_timeout_secs: 8,
            retry_delay_secs: 5,
            max_cycles: None,
            lamports_per_unit: LAMPORTS_PER_SOL,
            token_programs: vec![TOKEN_PROGRAM_ID.to_string()],
            performance_sample_limit: 1,
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            structured_logging: false,
        }
    }
}

impl QueryConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let config: Self = toml::from_str(&content)?;

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Replace the endpoint pool from `LEDGER_QUERY_ENDPOINTS` when it is set
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides resolved through `lookup`, keyed by environment variable name
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENDPOINTS_ENV) {
            self.override_endpoints(&value);
        }
    }

    /// Replace the endpoint pool with a comma-separated URL list; blank lists are ignored
    pub fn override_endpoints(&mut self, list: &str) {
        let endpoints: Vec<EndpointConfig> = list
            .split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(EndpointConfig::new)
            .collect();

        if !endpoints.is_empty() {
            self.pool.endpoints = endpoints;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.endpoints.is_empty() {
            return Err(ConfigError::EmptyPool);
        }
        Validate::validate(&self.pool)?;
        for endpoint in &self.pool.endpoints {
            Validate::validate(endpoint)?;
        }
        Validate::validate(&self.query)?;

        self.endpoint_pool()?;
        self.fetch_settings()?;
        Ok(())
    }

    pub fn endpoint_pool(&self) -> Result<EndpointPool, ConfigError> {
        let endpoints = self
            .pool
            .endpoints
            .iter()
            .map(EndpointConfig::to_endpoint)
            .collect::<Result<Vec<_>, _>>()?;

        EndpointPool::new(endpoints)
    }

    pub fn fetch_settings(&self) -> Result<FetchSettings, ConfigError> {
        let token_programs = self
            .query
            .token_programs
            .iter()
            .map(|id| {
                Pubkey::from_str(id.trim()).map_err(|e| ConfigError::InvalidValue {
                    field: "query.token_programs",
                    reason: format!("{}: {}", id, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(FetchSettings {
            call_timeout: Duration::from_secs(self.query.call_timeout_secs),
            token_programs,
            sample_limit: self.query.performance_sample_limit,
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            delay: Duration::from_secs(self.query.retry_delay_secs),
            max_cycles: self.query.max_cycles,
        }
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.query.lamports_per_unit, self.metrics_fallback)
    }
}
