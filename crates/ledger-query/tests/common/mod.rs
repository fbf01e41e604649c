//! Shared test fixtures: a scripted in-memory ledger

#![allow(dead_code)]

use async_trait::async_trait;
use ledger_query::{
    Endpoint, EndpointFailure, EndpointPool, EpochInfo, FetchSettings, LedgerRpc, Normalizer, PerformanceSample,
    QueryClient, RawTokenAccount, RetryPolicy,
};
use solana_sdk::pubkey::Pubkey;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACCOUNT: &str = "11111111111111111111111111111111";

/// What one endpoint does on one attempt
#[derive(Debug, Clone)]
pub enum Step {
    Balance(u64),
    Holdings(Vec<RawTokenAccount>),
    Metrics {
        samples: Vec<PerformanceSample>,
        epoch: u64,
        slot: u64,
    },
    Fail(EndpointFailure),
    /// Wait, then behave like the inner step
    Slow(Duration, Box<Step>),
}

impl Step {
    pub fn refused() -> Self {
        Step::Fail(EndpointFailure::Transport("connection refused".to_string()))
    }

    pub fn slow(delay: Duration, then: Step) -> Self {
        Step::Slow(delay, Box::new(then))
    }

    /// The step with any delays stripped
    fn settled(&self) -> Step {
        match self {
            Step::Slow(_, then) => then.settled(),
            other => other.clone(),
        }
    }
}

/// In-memory ledger answering from per-endpoint scripts.
///
/// Each attempt (the first call of an operation) consumes the next step of
/// the endpoint's script; the last step repeats forever. Follow-up calls of
/// the same attempt (epoch info, slot) reuse the step being played.
#[derive(Default)]
pub struct ScriptedRpc {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    current: Mutex<HashMap<String, Step>>,
    attempts: Mutex<Vec<String>>,
    calls: Mutex<Vec<(String, &'static str)>>,
}

impl ScriptedRpc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, url: &str, steps: Vec<Step>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), steps.into_iter().collect());
        self
    }

    /// Endpoint URLs in the order attempts reached them
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, endpoint: &Endpoint, method: &'static str) {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.url().to_string(), method));
    }

    fn next_step(&self, endpoint: &Endpoint, method: &'static str) -> Step {
        self.record(endpoint, method);
        self.attempts.lock().unwrap().push(endpoint.url().to_string());

        let step = {
            let mut scripts = self.scripts.lock().unwrap();
            match scripts.get_mut(endpoint.url()) {
                Some(steps) if steps.len() > 1 => steps.pop_front().unwrap(),
                Some(steps) => steps.front().cloned().unwrap_or_else(Step::refused),
                None => Step::refused(),
            }
        };

        self.current
            .lock()
            .unwrap()
            .insert(endpoint.url().to_string(), step.settled());
        step
    }

    fn current_step(&self, endpoint: &Endpoint, method: &'static str) -> Step {
        self.record(endpoint, method);
        self.current
            .lock()
            .unwrap()
            .get(endpoint.url())
            .cloned()
            .unwrap_or_else(Step::refused)
    }
}

async fn play(step: Step) -> Step {
    match step {
        Step::Slow(delay, then) => {
            tokio::time::sleep(delay).await;
            *then
        }
        other => other,
    }
}

fn unexpected(step: &Step) -> EndpointFailure {
    EndpointFailure::Malformed(format!("unexpected scripted step {:?}", step))
}

#[async_trait]
impl LedgerRpc for ScriptedRpc {
    async fn get_balance(&self, endpoint: &Endpoint, _account: &Pubkey) -> Result<u64, EndpointFailure> {
        match play(self.next_step(endpoint, "getBalance")).await {
            Step::Balance(lamports) => Ok(lamports),
            Step::Fail(failure) => Err(failure),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_token_accounts(
        &self,
        endpoint: &Endpoint,
        _owner: &Pubkey,
        _program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, EndpointFailure> {
        match play(self.next_step(endpoint, "getTokenAccountsByOwner")).await {
            Step::Holdings(accounts) => Ok(accounts),
            Step::Fail(failure) => Err(failure),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_performance_samples(
        &self,
        endpoint: &Endpoint,
        _limit: usize,
    ) -> Result<Vec<PerformanceSample>, EndpointFailure> {
        match play(self.next_step(endpoint, "getRecentPerformanceSamples")).await {
            Step::Metrics { samples, .. } => Ok(samples),
            Step::Fail(failure) => Err(failure),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_epoch_info(&self, endpoint: &Endpoint) -> Result<EpochInfo, EndpointFailure> {
        match self.current_step(endpoint, "getEpochInfo") {
            Step::Metrics { epoch, slot, .. } => Ok(EpochInfo {
                epoch,
                slot_index: slot % 432_000,
                slots_in_epoch: 432_000,
                absolute_slot: slot,
                block_height: None,
                transaction_count: None,
            }),
            other => Err(unexpected(&other)),
        }
    }

    async fn get_slot(&self, endpoint: &Endpoint) -> Result<u64, EndpointFailure> {
        match self.current_step(endpoint, "getSlot") {
            Step::Metrics { slot, .. } => Ok(slot),
            other => Err(unexpected(&other)),
        }
    }
}

pub fn urls(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("https://rpc-{}.test", i)).collect()
}

pub fn token(mint: &str, ui_amount: f64) -> RawTokenAccount {
    RawTokenAccount {
        address: format!("{}-account", mint),
        mint: mint.to_string(),
        amount: ((ui_amount * 1e6).round() as u64).to_string(),
        decimals: 6,
        ui_amount: Some(ui_amount),
    }
}

pub fn sample(num_transactions: u64, sample_period_secs: u16) -> PerformanceSample {
    PerformanceSample {
        slot: 264_000_000,
        num_transactions,
        num_slots: 150,
        sample_period_secs,
    }
}

/// Client over `rpc` with the default timeout, retry delay and scale
pub fn client(rpc: Arc<ScriptedRpc>, endpoints: &[String]) -> QueryClient {
    client_with_retry(rpc, endpoints, RetryPolicy::default())
}

pub fn client_with_retry(rpc: Arc<ScriptedRpc>, endpoints: &[String], retry: RetryPolicy) -> QueryClient {
    let pool = EndpointPool::from_urls(endpoints.iter().cloned()).unwrap();
    QueryClient::from_parts(rpc, pool, FetchSettings::default(), Normalizer::default(), retry)
}
