//! Core trait abstractions

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;

use super::error::EndpointFailure;
use super::types::{EpochInfo, PerformanceSample, RawTokenAccount};
use crate::pool::Endpoint;

/// Upstream ledger port.
///
/// Every call is addressed to one explicit endpoint; implementations keep no
/// per-endpoint state between calls. The failover orchestrator bounds each
/// call with its own timeout, so implementations only need to return
/// eventually.
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// `getBalance`: native balance in lamports
    async fn get_balance(&self, endpoint: &Endpoint, account: &Pubkey) -> Result<u64, EndpointFailure>;

    /// `getTokenAccountsByOwner` filtered by token program
    async fn get_token_accounts(
        &self,
        endpoint: &Endpoint,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, EndpointFailure>;

    /// `getRecentPerformanceSamples`, newest first
    async fn get_performance_samples(
        &self,
        endpoint: &Endpoint,
        limit: usize,
    ) -> Result<Vec<PerformanceSample>, EndpointFailure>;

    /// `getEpochInfo`
    async fn get_epoch_info(&self, endpoint: &Endpoint) -> Result<EpochInfo, EndpointFailure>;

    /// `getSlot`
    async fn get_slot(&self, endpoint: &Endpoint) -> Result<u64, EndpointFailure>;
}
