//! Core domain types

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;
use std::str::FromStr;

use super::error::QueryError;

/// Shortest accepted base58 account identifier
pub const MIN_IDENTIFIER_LEN: usize = 32;

/// Longest accepted base58 account identifier
pub const MAX_IDENTIFIER_LEN: usize = 44;

/// A validated ledger account address.
///
/// Parsing is purely local: a value of this type guarantees the input was a
/// 32..=44 character base58 string decoding to a 32-byte public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccountIdentifier(Pubkey);

impl AccountIdentifier {
    pub fn parse(input: &str) -> Result<Self, QueryError> {
        let candidate = input.trim();

        if !(MIN_IDENTIFIER_LEN..=MAX_IDENTIFIER_LEN).contains(&candidate.len()) {
            return Err(QueryError::InvalidIdentifier {
                input: input.to_string(),
                reason: format!(
                    "expected {}..={} characters, got {}",
                    MIN_IDENTIFIER_LEN,
                    MAX_IDENTIFIER_LEN,
                    candidate.len()
                ),
            });
        }

        Pubkey::from_str(candidate)
            .map(Self)
            .map_err(|e| QueryError::InvalidIdentifier {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.0
    }
}

impl FromStr for AccountIdentifier {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Pubkey> for AccountIdentifier {
    fn from(pubkey: Pubkey) -> Self {
        Self(pubkey)
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of query issued against the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Balance,
    Holdings,
    NetworkMetrics,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Balance => write!(f, "balance"),
            OperationKind::Holdings => write!(f, "holdings"),
            OperationKind::NetworkMetrics => write!(f, "network metrics"),
        }
    }
}

/// A single query, constructed per call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    Balance(AccountIdentifier),
    Holdings(AccountIdentifier),
    NetworkMetrics,
}

impl QueryRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            QueryRequest::Balance(_) => OperationKind::Balance,
            QueryRequest::Holdings(_) => OperationKind::Holdings,
            QueryRequest::NetworkMetrics => OperationKind::NetworkMetrics,
        }
    }

    pub fn identifier(&self) -> Option<&AccountIdentifier> {
        match self {
            QueryRequest::Balance(id) | QueryRequest::Holdings(id) => Some(id),
            QueryRequest::NetworkMetrics => None,
        }
    }
}

/// Token account record as returned by `getTokenAccountsByOwner`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTokenAccount {
    /// Token account address
    pub address: String,
    /// Token mint address
    pub mint: String,
    /// Raw amount in base units, as a decimal string
    pub amount: String,
    pub decimals: u8,
    /// Upstream display amount, absent on some nodes
    pub ui_amount: Option<f64>,
}

/// One entry of `getRecentPerformanceSamples`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub slot: u64,
    pub num_transactions: u64,
    pub num_slots: u64,
    pub sample_period_secs: u16,
}

/// Result of `getEpochInfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub epoch: u64,
    pub slot_index: u64,
    pub slots_in_epoch: u64,
    pub absolute_slot: u64,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub transaction_count: Option<u64>,
}

/// Endpoint response, tagged by operation kind. Never handed to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum RawQueryResult {
    Balance {
        lamports: u64,
    },
    Holdings(Vec<RawTokenAccount>),
    Metrics {
        samples: Vec<PerformanceSample>,
        epoch_info: EpochInfo,
        slot: u64,
    },
}

impl RawQueryResult {
    pub fn kind(&self) -> OperationKind {
        match self {
            RawQueryResult::Balance { .. } => OperationKind::Balance,
            RawQueryResult::Holdings(_) => OperationKind::Holdings,
            RawQueryResult::Metrics { .. } => OperationKind::NetworkMetrics,
        }
    }
}

/// Native balance in display units
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceResult {
    pub lamports: u64,
    pub balance: f64,
}

/// A non-zero token position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    pub mint: String,
    pub amount: f64,
    pub decimals: u8,
}

/// Token positions in upstream order, zero balances removed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HoldingsResult {
    pub holdings: Vec<Holding>,
}

impl HoldingsResult {
    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter()
    }
}

/// Where the numbers in a [`MetricsResult`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsSource {
    /// Everything measured by an endpoint
    Live,
    /// Epoch and slot measured, throughput substituted (no usable sample)
    PartialFallback,
    /// No endpoint answered; all three values are the fallback constants
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsResult {
    pub tps: u64,
    pub epoch: u64,
    pub slot: u64,
    pub source: MetricsSource,
}

/// Normalized result, one variant per operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NormalizedResult {
    Balance(BalanceResult),
    Holdings(HoldingsResult),
    Metrics(MetricsResult),
}

impl NormalizedResult {
    pub fn kind(&self) -> OperationKind {
        match self {
            NormalizedResult::Balance(_) => OperationKind::Balance,
            NormalizedResult::Holdings(_) => OperationKind::Holdings,
            NormalizedResult::Metrics(_) => OperationKind::NetworkMetrics,
        }
    }
}

impl fmt::Display for BalanceResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} SOL ({} lamports)", self.balance, self.lamports)
    }
}

impl fmt::Display for HoldingsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.holdings.is_empty() {
            return write!(f, "no token holdings");
        }
        for (i, holding) in self.holdings.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{:<44}  {} (decimals: {})",
                holding.mint, holding.amount, holding.decimals
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for MetricsResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "tps: {}, epoch: {}, slot: {}",
            self.tps, self.epoch, self.slot
        )?;
        match self.source {
            MetricsSource::Live => Ok(()),
            MetricsSource::PartialFallback => write!(f, " (throughput estimated)"),
            MetricsSource::Fallback => write!(f, " (fallback values)"),
        }
    }
}

impl fmt::Display for NormalizedResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedResult::Balance(b) => b.fmt(f),
            NormalizedResult::Holdings(h) => h.fmt(f),
            NormalizedResult::Metrics(m) => m.fmt(f),
        }
    }
}
