//! Lightweight Solana RPC client
//!
//! A minimal JSON-RPC 2.0 client implementing only the calls the query client
//! needs, avoiding the dependency chain of solana-client. Requests run on the
//! blocking pool through `ureq`; each call is addressed to an explicit
//! endpoint so one client serves the whole pool.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use solana_sdk::pubkey::Pubkey;
use std::time::Duration;
use tracing::debug;

use crate::core::error::EndpointFailure;
use crate::core::traits::LedgerRpc;
use crate::core::types::{EpochInfo, PerformanceSample, RawTokenAccount};
use crate::pool::Endpoint;

/// SPL Token program
pub const TOKEN_PROGRAM_ID: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// SPL Token-2022 program
pub const TOKEN_2022_PROGRAM_ID: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Parsed form of [`TOKEN_PROGRAM_ID`]
pub const TOKEN_PROGRAM: Pubkey = solana_sdk::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Lightweight RPC client for Solana
#[derive(Clone)]
pub struct LightRpcClient {
    agent: ureq::Agent,
}

/// RPC response wrapper
#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

/// RPC error structure
#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

/// `{ context, value }` envelope used by most account queries
#[derive(Debug, Deserialize)]
struct Contextual<T> {
    value: T,
}

/// One entry of a jsonParsed `getTokenAccountsByOwner` response
#[derive(Debug, Deserialize)]
struct KeyedTokenAccount {
    pubkey: String,
    account: ParsedAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedAccount {
    data: ParsedAccountData,
}

#[derive(Debug, Deserialize)]
struct ParsedAccountData {
    parsed: ParsedTokenAccount,
}

#[derive(Debug, Deserialize)]
struct ParsedTokenAccount {
    info: TokenAccountInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAccountInfo {
    mint: String,
    token_amount: TokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenAmount {
    amount: String,
    decimals: u8,
    ui_amount: Option<f64>,
}

impl From<KeyedTokenAccount> for RawTokenAccount {
    fn from(keyed: KeyedTokenAccount) -> Self {
        let info = keyed.account.data.parsed.info;
        RawTokenAccount {
            address: keyed.pubkey,
            mint: info.mint,
            amount: info.token_amount.amount,
            decimals: info.token_amount.decimals,
            ui_amount: info.token_amount.ui_amount,
        }
    }
}

impl Default for LightRpcClient {
    fn default() -> Self {
        Self::new()
    }
}

impl LightRpcClient {
    /// Create a new lightweight RPC client
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new().timeout_connect(CONNECT_TIMEOUT).build();

        Self { agent }
    }

    /// Make a JSON-RPC call against `endpoint`
    async fn call<T>(&self, endpoint: &Endpoint, method: &'static str, params: Value) -> Result<T, EndpointFailure>
    where
        T: DeserializeOwned,
    {
        debug!(endpoint = %endpoint.url(), "RPC call: {} with params: {}", method, params);

        let request_body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params
        });

        // ureq is sync; a timed-out call keeps running here until its own ceiling
        let response_body = tokio::task::spawn_blocking({
            let agent = self.agent.clone();
            let url = endpoint.url().to_string();
            let ceiling = endpoint.confirm_timeout();
            let body = request_body.to_string();

            move || {
                let response = agent
                    .post(&url)
                    .timeout(ceiling)
                    .set("Content-Type", "application/json")
                    .send_string(&body)
                    .map_err(transport_failure)?;

                response
                    .into_string()
                    .map_err(|e| EndpointFailure::Transport(e.to_string()))
            }
        })
        .await
        .map_err(|e| EndpointFailure::Transport(format!("RPC worker failed: {}", e)))??;

        parse_response(&response_body)
    }
}

fn parse_response<T: DeserializeOwned>(body: &str) -> Result<T, EndpointFailure> {
    let rpc_response: RpcResponse<T> = serde_json::from_str(body)?;

    if let Some(error) = rpc_response.error {
        return Err(EndpointFailure::Rpc {
            code: error.code,
            message: error.message,
        });
    }

    rpc_response
        .result
        .ok_or_else(|| EndpointFailure::Malformed("No result in RPC response".to_string()))
}

fn transport_failure(err: ureq::Error) -> EndpointFailure {
    match err {
        ureq::Error::Status(429, _) => EndpointFailure::RateLimited { status: 429 },
        ureq::Error::Status(code, response) => {
            EndpointFailure::Transport(format!("HTTP {} {}", code, response.status_text()))
        }
        ureq::Error::Transport(transport) => EndpointFailure::Transport(transport.to_string()),
    }
}

#[async_trait]
impl LedgerRpc for LightRpcClient {
    async fn get_balance(&self, endpoint: &Endpoint, account: &Pubkey) -> Result<u64, EndpointFailure> {
        let params = json!([
            account.to_string(),
            { "commitment": endpoint.commitment_str() }
        ]);

        let response: Contextual<u64> = self.call(endpoint, "getBalance", params).await?;
        Ok(response.value)
    }

    async fn get_token_accounts(
        &self,
        endpoint: &Endpoint,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, EndpointFailure> {
        let params = json!([
            owner.to_string(),
            { "programId": program_id.to_string() },
            {
                "encoding": "jsonParsed",
                "commitment": endpoint.commitment_str()
            }
        ]);

        let response: Contextual<Vec<KeyedTokenAccount>> =
            self.call(endpoint, "getTokenAccountsByOwner", params).await?;

        Ok(response.value.into_iter().map(RawTokenAccount::from).collect())
    }

    async fn get_performance_samples(
        &self,
        endpoint: &Endpoint,
        limit: usize,
    ) -> Result<Vec<PerformanceSample>, EndpointFailure> {
        self.call(endpoint, "getRecentPerformanceSamples", json!([limit])).await
    }

    async fn get_epoch_info(&self, endpoint: &Endpoint) -> Result<EpochInfo, EndpointFailure> {
        let params = json!([{ "commitment": endpoint.commitment_str() }]);
        self.call(endpoint, "getEpochInfo", params).await
    }

    async fn get_slot(&self, endpoint: &Endpoint) -> Result<u64, EndpointFailure> {
        let params = json!([{ "commitment": endpoint.commitment_str() }]);
        self.call(endpoint, "getSlot", params).await
    }
}
