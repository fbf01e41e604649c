//! Timeout race wrapper around a single upstream call

use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::core::error::EndpointFailure;
use crate::pool::Endpoint;

/// Per-call budget, independent of operation kind
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(8);

/// Wait for `call` against `endpoint` for at most `budget`.
///
/// On timeout the call future is dropped and the caller moves on. Work the
/// call already handed to the blocking pool (the HTTP transport) is abandoned
/// rather than cancelled and finishes on its own transport ceiling.
pub async fn race<T, F>(endpoint: &Endpoint, budget: Duration, call: F) -> Result<T, EndpointFailure>
where
    F: Future<Output = Result<T, EndpointFailure>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => {
            debug!(endpoint = %endpoint.url(), ?budget, "Abandoning RPC call after timeout");
            Err(EndpointFailure::Timeout(budget))
        }
    }
}
