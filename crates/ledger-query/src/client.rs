//! Query client: the boundary presentation code talks to

use std::sync::Arc;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::QueryConfig;
use crate::core::error::{ConfigError, NormalizeError, QueryError, QueryResult};
use crate::core::traits::LedgerRpc;
use crate::core::types::{
    AccountIdentifier, BalanceResult, HoldingsResult, MetricsResult, QueryRequest, RawQueryResult,
};
use crate::failover::{FailoverOrchestrator, FetchSettings};
use crate::normalize::Normalizer;
use crate::pool::EndpointPool;
use crate::retry::{emit, CongestionRetry, QueryEvent, RetryPolicy};
use crate::rpc_client::LightRpcClient;

/// Per-call options: cancellation and progress reporting
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub cancel: Option<CancellationToken>,
    pub events: Option<Sender<QueryEvent>>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Report congestion advisories on `events`.
    ///
    /// Events are sent with `try_send`: while the channel is full, further
    /// advisories are dropped instead of queued, so an undrained receiver
    /// costs at most its capacity however long the query keeps retrying.
    pub fn with_events(mut self, events: Sender<QueryEvent>) -> Self {
        self.events = Some(events);
        self
    }

    fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone().unwrap_or_default()
    }
}

/// Resilient account query client.
///
/// Cheap to clone; clones share the read-only endpoint pool and transport.
/// Requests are independent and may run concurrently.
#[derive(Clone)]
pub struct QueryClient {
    orchestrator: Arc<FailoverOrchestrator>,
    normalizer: Normalizer,
    retry: RetryPolicy,
}

impl QueryClient {
    /// Build a client over the HTTP transport
    pub fn new(config: &QueryConfig) -> Result<Self, ConfigError> {
        Self::with_rpc(config, Arc::new(LightRpcClient::new()))
    }

    /// Build a client over any [`LedgerRpc`] implementation
    pub fn with_rpc(config: &QueryConfig, rpc: Arc<dyn LedgerRpc>) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self::from_parts(
            rpc,
            config.endpoint_pool()?,
            config.fetch_settings()?,
            config.normalizer(),
            config.retry_policy(),
        ))
    }

    pub fn from_parts(
        rpc: Arc<dyn LedgerRpc>,
        pool: EndpointPool,
        settings: FetchSettings,
        normalizer: Normalizer,
        retry: RetryPolicy,
    ) -> Self {
        info!(endpoints = pool.len(), "Query client ready");
        Self {
            orchestrator: Arc::new(FailoverOrchestrator::new(rpc, pool, settings)),
            normalizer,
            retry,
        }
    }

    pub fn pool(&self) -> &EndpointPool {
        self.orchestrator.pool()
    }

    /// Native balance of `identifier` in display units
    pub async fn query_balance(&self, identifier: &str, options: QueryOptions) -> QueryResult<BalanceResult> {
        let request = QueryRequest::Balance(AccountIdentifier::parse(identifier)?);
        self.retrying(&request, &options, |raw| self.normalizer.balance(raw))
            .await
    }

    /// Non-zero token holdings of `identifier`, in upstream order
    pub async fn query_holdings(&self, identifier: &str, options: QueryOptions) -> QueryResult<HoldingsResult> {
        let request = QueryRequest::Holdings(AccountIdentifier::parse(identifier)?);
        self.retrying(&request, &options, |raw| self.normalizer.holdings(raw))
            .await
    }

    /// Network throughput, epoch and slot.
    ///
    /// Does not enter the retry loop: when the pool is exhausted the fallback
    /// triple is returned after a single congestion advisory.
    pub async fn query_network_metrics(&self, options: QueryOptions) -> QueryResult<MetricsResult> {
        let cancel = options.cancel_token();
        if cancel.is_cancelled() {
            return Err(QueryError::Cancelled);
        }

        let request = QueryRequest::NetworkMetrics;
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(QueryError::Cancelled),
            outcome = self.orchestrator.run(&request, |raw| self.normalizer.metrics(raw)) => outcome,
        };

        match outcome {
            Ok(metrics) => Ok(metrics),
            Err(exhausted) => {
                warn!(
                    endpoints = exhausted.attempts(),
                    "No endpoint returned network metrics, using fallback values"
                );
                emit(
                    options.events.as_ref(),
                    QueryEvent::Congested {
                        kind: request.kind(),
                        cycle: 1,
                        failed_endpoints: exhausted.attempts(),
                        retry_in: None,
                    },
                );
                Ok(self.normalizer.fallback_metrics())
            }
        }
    }

    async fn retrying<T, F>(&self, request: &QueryRequest, options: &QueryOptions, normalize: F) -> QueryResult<T>
    where
        F: Fn(&RawQueryResult) -> Result<T, NormalizeError>,
    {
        let normalize = &normalize;
        let orchestrator = &self.orchestrator;

        CongestionRetry::new(self.retry, options.cancel_token(), options.events.as_ref())
            .run(request.kind(), move || orchestrator.run(request, normalize))
            .await
    }
}
