//! Centralized error types for the ledger query client

use std::time::Duration;
use thiserror::Error;

use super::types::OperationKind;

/// Errors that cross the query client boundary
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("Invalid account identifier {input:?}: {reason}")]
    InvalidIdentifier { input: String, reason: String },

    #[error("Network congested: all {endpoints} endpoints failed after {cycles} cycle(s)")]
    PoolExhausted { cycles: u32, endpoints: usize },

    #[error("Query cancelled")]
    Cancelled,
}

impl QueryError {
    /// Whether the caller withdrew the request, as opposed to the network failing it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, QueryError::Cancelled)
    }
}

/// Failure of a single attempt against a single endpoint.
///
/// These never leave the failover orchestrator; they are logged and kept on
/// the exhausted-cycle record for diagnostics.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EndpointFailure {
    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection failed: {0}")]
    Transport(String),

    #[error("Rate limited (HTTP {status})")]
    RateLimited { status: u16 },

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl EndpointFailure {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EndpointFailure::Timeout(_))
    }
}

impl From<serde_json::Error> for EndpointFailure {
    fn from(err: serde_json::Error) -> Self {
        EndpointFailure::Malformed(err.to_string())
    }
}

impl From<NormalizeError> for EndpointFailure {
    fn from(err: NormalizeError) -> Self {
        EndpointFailure::Malformed(err.to_string())
    }
}

/// Rejections raised while normalizing a raw upstream result
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizeError {
    #[error("Expected a {expected} result, got {actual}")]
    KindMismatch {
        expected: OperationKind,
        actual: OperationKind,
    },

    #[error("Invalid token amount {amount:?} for mint {mint}")]
    InvalidAmount { mint: String, amount: String },

    #[error("Performance sample at slot {slot} overflows the transaction total")]
    InvalidSample { slot: u64 },

    #[error("Unit scale factor must be non-zero")]
    ZeroScale,
}

/// Configuration errors, all detected at startup
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Endpoint pool is empty")]
    EmptyPool,

    #[error("Invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Result type alias for query operations
pub type QueryResult<T> = Result<T, QueryError>;
