//! Resilient Solana account query client
//!
//! Fetches native balances, token holdings and network metrics through an
//! ordered pool of RPC endpoints. Each endpoint attempt is bounded by a fixed
//! timeout, endpoints are tried strictly in declared order, and a pass in which
//! every endpoint fails is retried after a fixed delay until it succeeds or
//! the caller cancels.
//!
//! # Example
//!
//! ```rust,no_run
//! use ledger_query::{QueryClient, QueryConfig, QueryOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = QueryClient::new(&QueryConfig::default())?;
//!     let balance = client
//!         .query_balance("11111111111111111111111111111111", QueryOptions::new())
//!         .await?;
//!     println!("{}", balance);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod core;
pub mod failover;
pub mod normalize;
pub mod pool;
pub mod race;
pub mod retry;
pub mod rpc_client;

// Re-export commonly used types
pub use crate::client::{QueryClient, QueryOptions};
pub use crate::config::QueryConfig;
pub use crate::core::error::{ConfigError, EndpointFailure, NormalizeError, QueryError, QueryResult};
pub use crate::core::traits::LedgerRpc;
pub use crate::core::types::{
    AccountIdentifier, BalanceResult, EpochInfo, Holding, HoldingsResult, MetricsResult, MetricsSource,
    NormalizedResult, OperationKind, PerformanceSample, QueryRequest, RawQueryResult, RawTokenAccount,
};
pub use crate::failover::{FailoverOrchestrator, FetchSettings, PoolExhausted};
pub use crate::normalize::{FallbackMetrics, Normalizer};
pub use crate::pool::{Endpoint, EndpointPool};
pub use crate::retry::{CongestionRetry, QueryEvent, RetryPolicy};
pub use crate::rpc_client::LightRpcClient;
