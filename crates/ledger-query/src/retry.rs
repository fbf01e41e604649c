//! Congestion retry loop
//!
//! Drives repeated failover cycles as an explicit state machine:
//!
//! ```text
//! Attempting --PoolExhausted--> AllFailed --advisory--> Waiting --delay--> Attempting
//!     |                            |
//!     +--success--> done           +--max_cycles reached--> PoolExhausted
//! ```
//!
//! Cancellation is observed in `Attempting` and `Waiting`, the only two
//! places the loop suspends.

use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::QueryError;
use crate::core::types::OperationKind;
use crate::failover::PoolExhausted;

/// Delay between an exhausted cycle and the next one
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Exhausted cycles before giving up; `None` retries until cancelled
    pub max_cycles: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RETRY_DELAY,
            max_cycles: None,
        }
    }
}

/// Retry loop state; `cycle` counts failover passes from 1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Attempting { cycle: u32 },
    AllFailed { cycle: u32, endpoints: usize },
    Waiting { cycle: u32 },
}

/// Non-terminal progress reported to the caller while a query is in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    /// Every endpoint failed in `cycle`. `retry_in` is `None` when no retry follows.
    Congested {
        kind: OperationKind,
        cycle: u32,
        failed_endpoints: usize,
        retry_in: Option<Duration>,
    },
    /// The retry wait elapsed and `cycle` is starting from the first endpoint
    Retrying { kind: OperationKind, cycle: u32 },
}

/// Deliver `event` without waiting. A full channel drops the event, so a
/// listener that stops draining never holds up or grows with the retry loop.
pub(crate) fn emit(events: Option<&Sender<QueryEvent>>, event: QueryEvent) {
    let Some(events) = events else {
        return;
    };

    match events.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(event)) => debug!(?event, "Event channel full, dropping advisory"),
        // A dropped receiver only means nobody is listening
        Err(TrySendError::Closed(_)) => {}
    }
}

/// One query's retry loop
pub struct CongestionRetry<'a> {
    policy: RetryPolicy,
    cancel: CancellationToken,
    events: Option<&'a Sender<QueryEvent>>,
}

impl<'a> CongestionRetry<'a> {
    pub fn new(
        policy: RetryPolicy,
        cancel: CancellationToken,
        events: Option<&'a Sender<QueryEvent>>,
    ) -> Self {
        Self { policy, cancel, events }
    }

    /// Run `attempt` (one failover pass) until it succeeds, the caller cancels,
    /// or the optional cycle bound is reached.
    pub async fn run<T, F, Fut>(&self, kind: OperationKind, mut attempt: F) -> Result<T, QueryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, PoolExhausted>>,
    {
        let mut state = RetryState::Attempting { cycle: 1 };

        loop {
            debug!(%kind, ?state, "Retry loop transition");

            state = match state {
                RetryState::Attempting { cycle } => {
                    if self.cancel.is_cancelled() {
                        return Err(QueryError::Cancelled);
                    }

                    let outcome = tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                        outcome = attempt() => outcome,
                    };

                    match outcome {
                        Ok(result) => {
                            if cycle > 1 {
                                info!(%kind, cycle, "Query recovered after congestion");
                            }
                            return Ok(result);
                        }
                        Err(exhausted) => RetryState::AllFailed {
                            cycle,
                            endpoints: exhausted.attempts(),
                        },
                    }
                }

                RetryState::AllFailed { cycle, endpoints } => {
                    let give_up = self.policy.max_cycles.is_some_and(|max| cycle >= max);
                    let retry_in = (!give_up).then_some(self.policy.delay);

                    warn!(%kind, cycle, endpoints, ?retry_in, "All endpoints failed, network congested");
                    emit(
                        self.events,
                        QueryEvent::Congested {
                            kind,
                            cycle,
                            failed_endpoints: endpoints,
                            retry_in,
                        },
                    );

                    if give_up {
                        return Err(QueryError::PoolExhausted {
                            cycles: cycle,
                            endpoints,
                        });
                    }
                    RetryState::Waiting { cycle }
                }

                RetryState::Waiting { cycle } => {
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return Err(QueryError::Cancelled),
                        _ = tokio::time::sleep(self.policy.delay) => {}
                    }

                    let next = cycle.saturating_add(1);
                    emit(self.events, QueryEvent::Retrying { kind, cycle: next });
                    RetryState::Attempting { cycle: next }
                }
            };
        }
    }
}
