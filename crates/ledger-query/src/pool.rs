//! Endpoint pool: the ordered, read-only list of upstream RPC services

use solana_sdk::commitment_config::CommitmentLevel;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::ConfigError;

/// Default ceiling on a single HTTP exchange with an endpoint
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(60);

/// One upstream RPC service and its fixed connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    commitment: CommitmentLevel,
    confirm_timeout: Duration,
}

impl Endpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            commitment: CommitmentLevel::Confirmed,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.commitment = commitment;
        self
    }

    pub fn with_confirm_timeout(mut self, timeout: Duration) -> Self {
        self.confirm_timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn commitment(&self) -> CommitmentLevel {
        self.commitment
    }

    /// Commitment as spelled in JSON-RPC request configs
    pub fn commitment_str(&self) -> &'static str {
        commitment_name(self.commitment)
    }

    pub fn confirm_timeout(&self) -> Duration {
        self.confirm_timeout
    }
}

/// Parse a commitment level name as used in config files
pub fn parse_commitment(name: &str) -> Option<CommitmentLevel> {
    match name.trim().to_ascii_lowercase().as_str() {
        "processed" => Some(CommitmentLevel::Processed),
        "confirmed" => Some(CommitmentLevel::Confirmed),
        "finalized" => Some(CommitmentLevel::Finalized),
        _ => None,
    }
}

fn commitment_name(level: CommitmentLevel) -> &'static str {
    match level {
        CommitmentLevel::Processed => "processed",
        CommitmentLevel::Confirmed => "confirmed",
        CommitmentLevel::Finalized => "finalized",
    }
}

/// Ordered, non-empty set of endpoints.
///
/// Order declares preference. Cloning is cheap and clones share storage.
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Arc<[Endpoint]>,
}

impl EndpointPool {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::EmptyPool);
        }

        Ok(Self {
            endpoints: endpoints.into(),
        })
    }

    /// Build a pool from bare URLs with default connection parameters
    pub fn from_urls<I, S>(urls: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(urls.into_iter().map(Endpoint::new).collect())
    }

    /// Endpoints in declared order
    pub fn iter(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.iter()
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// Always false; an empty pool cannot be constructed
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn urls(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.url()).collect()
    }
}
