//! Response normalizer: raw endpoint results to display values
//!
//! Everything here is a pure function of its input. Malformed input is
//! reported as a [`NormalizeError`], which the failover orchestrator counts as
//! a failure of the endpoint that produced it.

use serde::{Deserialize, Serialize};
use solana_sdk::native_token::LAMPORTS_PER_SOL;

use crate::core::error::NormalizeError;
use crate::core::types::{
    BalanceResult, Holding, HoldingsResult, MetricsResult, MetricsSource, NormalizedResult, OperationKind,
    PerformanceSample, RawQueryResult, RawTokenAccount,
};

/// Metrics reported when no endpoint (or no sample) yields data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackMetrics {
    pub tps: u64,
    pub epoch: u64,
    pub slot: u64,
}

impl Default for FallbackMetrics {
    fn default() -> Self {
        Self {
            tps: 3_000,
            epoch: 0,
            slot: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalizer {
    /// Native units per display unit
    scale: u64,
    fallback: FallbackMetrics,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(LAMPORTS_PER_SOL, FallbackMetrics::default())
    }
}

impl Normalizer {
    pub fn new(scale: u64, fallback: FallbackMetrics) -> Self {
        Self { scale, fallback }
    }

    pub fn scale(&self) -> u64 {
        self.scale
    }

    /// Normalize any raw result into the matching variant
    pub fn normalize(&self, raw: &RawQueryResult) -> Result<NormalizedResult, NormalizeError> {
        match raw.kind() {
            OperationKind::Balance => self.balance(raw).map(NormalizedResult::Balance),
            OperationKind::Holdings => self.holdings(raw).map(NormalizedResult::Holdings),
            OperationKind::NetworkMetrics => self.metrics(raw).map(NormalizedResult::Metrics),
        }
    }

    pub fn balance(&self, raw: &RawQueryResult) -> Result<BalanceResult, NormalizeError> {
        let RawQueryResult::Balance { lamports } = raw else {
            return Err(mismatch(OperationKind::Balance, raw));
        };
        if self.scale == 0 {
            return Err(NormalizeError::ZeroScale);
        }

        Ok(BalanceResult {
            lamports: *lamports,
            balance: *lamports as f64 / self.scale as f64,
        })
    }

    /// Drops records whose display amount is not strictly positive; keeps upstream order
    pub fn holdings(&self, raw: &RawQueryResult) -> Result<HoldingsResult, NormalizeError> {
        let RawQueryResult::Holdings(accounts) = raw else {
            return Err(mismatch(OperationKind::Holdings, raw));
        };

        let mut holdings = Vec::with_capacity(accounts.len());
        for account in accounts {
            let holding = to_holding(account)?;
            if holding.amount > 0.0 {
                holdings.push(holding);
            }
        }

        Ok(HoldingsResult { holdings })
    }

    pub fn metrics(&self, raw: &RawQueryResult) -> Result<MetricsResult, NormalizeError> {
        let RawQueryResult::Metrics {
            samples,
            epoch_info,
            slot,
        } = raw
        else {
            return Err(mismatch(OperationKind::NetworkMetrics, raw));
        };

        let (tps, source) = match throughput(samples)? {
            Some(tps) => (tps, MetricsSource::Live),
            None => (self.fallback.tps, MetricsSource::PartialFallback),
        };

        Ok(MetricsResult {
            tps,
            epoch: epoch_info.epoch,
            slot: *slot,
            source,
        })
    }

    /// The full fallback triple, used when the pool is exhausted
    pub fn fallback_metrics(&self) -> MetricsResult {
        MetricsResult {
            tps: self.fallback.tps,
            epoch: self.fallback.epoch,
            slot: self.fallback.slot,
            source: MetricsSource::Fallback,
        }
    }
}

/// Transactions per second across `samples`, rounded to the nearest integer.
///
/// `Ok(None)` when there is no sample or the samples cover no time. A
/// transaction total that does not fit a `u64` is rejected.
pub fn throughput(samples: &[PerformanceSample]) -> Result<Option<u64>, NormalizeError> {
    let mut transactions: u64 = 0;
    let mut period_secs: u64 = 0;

    for sample in samples {
        transactions = transactions
            .checked_add(sample.num_transactions)
            .ok_or(NormalizeError::InvalidSample { slot: sample.slot })?;
        period_secs = period_secs
            .checked_add(u64::from(sample.sample_period_secs))
            .ok_or(NormalizeError::InvalidSample { slot: sample.slot })?;
    }

    if period_secs == 0 {
        return Ok(None);
    }

    Ok(Some((transactions as f64 / period_secs as f64).round() as u64))
}

fn to_holding(account: &RawTokenAccount) -> Result<Holding, NormalizeError> {
    let amount = match account.ui_amount {
        Some(ui_amount) => ui_amount,
        None => {
            let base_units: u128 = account.amount.trim().parse().map_err(|_| NormalizeError::InvalidAmount {
                mint: account.mint.clone(),
                amount: account.amount.clone(),
            })?;
            base_units as f64 / 10f64.powi(i32::from(account.decimals))
        }
    };

    Ok(Holding {
        mint: account.mint.clone(),
        amount,
        decimals: account.decimals,
    })
}

fn mismatch(expected: OperationKind, raw: &RawQueryResult) -> NormalizeError {
    NormalizeError::KindMismatch {
        expected,
        actual: raw.kind(),
    }
}
