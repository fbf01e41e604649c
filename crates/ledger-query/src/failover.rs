//! Failover orchestrator: one pass over the endpoint pool

use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::error::{EndpointFailure, NormalizeError};
use crate::core::traits::LedgerRpc;
use crate::core::types::{QueryRequest, RawQueryResult};
use crate::pool::{Endpoint, EndpointPool};
use crate::race::{race, DEFAULT_CALL_TIMEOUT};
use crate::rpc_client::TOKEN_PROGRAM;

/// Per-attempt fetch parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSettings {
    /// Race budget for one endpoint attempt
    pub call_timeout: Duration,
    /// Token programs whose accounts make up a holdings query, queried in order
    pub token_programs: Vec<Pubkey>,
    /// Number of performance samples requested for throughput
    pub sample_limit: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            call_timeout: DEFAULT_CALL_TIMEOUT,
            token_programs: vec![TOKEN_PROGRAM],
            sample_limit: 1,
        }
    }
}

/// A failed attempt, kept for diagnostics only
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptFailure {
    pub endpoint: String,
    pub failure: EndpointFailure,
}

/// Every endpoint in the pool failed during one pass
#[derive(Debug, Clone, PartialEq, Error)]
#[error("all {} endpoints failed", .failures.len())]
pub struct PoolExhausted {
    pub failures: Vec<AttemptFailure>,
}

impl PoolExhausted {
    pub fn attempts(&self) -> usize {
        self.failures.len()
    }

    pub fn timeouts(&self) -> usize {
        self.failures.iter().filter(|f| f.failure.is_timeout()).count()
    }
}

/// Walks the pool in declared order, one endpoint at a time.
///
/// Holds no state between runs: every run starts at the first endpoint.
#[derive(Clone)]
pub struct FailoverOrchestrator {
    rpc: Arc<dyn LedgerRpc>,
    pool: EndpointPool,
    settings: FetchSettings,
}

impl FailoverOrchestrator {
    pub fn new(rpc: Arc<dyn LedgerRpc>, pool: EndpointPool, settings: FetchSettings) -> Self {
        Self { rpc, pool, settings }
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Try each endpoint until one yields a raw result that `normalize` accepts.
    ///
    /// Timeouts, upstream errors and normalization rejections all count as a
    /// failure of that endpoint. The first success is returned as-is, even an
    /// empty one.
    pub async fn run<T, F>(&self, request: &QueryRequest, normalize: F) -> Result<T, PoolExhausted>
    where
        F: Fn(&RawQueryResult) -> Result<T, NormalizeError>,
    {
        let kind = request.kind();
        let mut failures = Vec::with_capacity(self.pool.len());

        for (index, endpoint) in self.pool.iter().enumerate() {
            let attempt = race(endpoint, self.settings.call_timeout, self.fetch(endpoint, request))
                .await
                .and_then(|raw| normalize(&raw).map_err(EndpointFailure::from));

            match attempt {
                Ok(result) => {
                    debug!(endpoint = %endpoint.url(), %kind, attempt = index + 1, "Query succeeded");
                    return Ok(result);
                }
                Err(failure) => {
                    warn!(endpoint = %endpoint.url(), %kind, error = %failure, "Endpoint failed, trying next");
                    failures.push(AttemptFailure {
                        endpoint: endpoint.url().to_string(),
                        failure,
                    });
                }
            }
        }

        Err(PoolExhausted { failures })
    }

    /// All upstream calls for one request, against one endpoint
    async fn fetch(&self, endpoint: &Endpoint, request: &QueryRequest) -> Result<RawQueryResult, EndpointFailure> {
        match request {
            QueryRequest::Balance(id) => {
                let lamports = self.rpc.get_balance(endpoint, id.pubkey()).await?;
                Ok(RawQueryResult::Balance { lamports })
            }
            QueryRequest::Holdings(id) => {
                let mut accounts = Vec::new();
                for program_id in &self.settings.token_programs {
                    accounts.extend(self.rpc.get_token_accounts(endpoint, id.pubkey(), program_id).await?);
                }
                Ok(RawQueryResult::Holdings(accounts))
            }
            QueryRequest::NetworkMetrics => {
                let samples = self
                    .rpc
                    .get_performance_samples(endpoint, self.settings.sample_limit)
                    .await?;
                let epoch_info = self.rpc.get_epoch_info(endpoint).await?;
                let slot = self.rpc.get_slot(endpoint).await?;
                Ok(RawQueryResult::Metrics {
                    samples,
                    epoch_info,
                    slot,
                })
            }
        }
    }
}
