//! Polling fallback: repeated status snapshots at a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use txwatch_core::{GatewayError, TxGateway, TxStatus};

/// Something observed by one poll.
#[derive(Debug)]
pub enum PollEvent {
    Snapshot(TxStatus),
    /// The gateway does not know the transaction yet (404).
    NotFound,
    Error(GatewayError),
}

/// Why the poll loop returned.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Terminal(TxStatus),
    ErrorBudgetExhausted { errors: u32, last_error: String },
}

/// Queries `GET /tx/status/{hash}` until the state is terminal.
///
/// The first poll happens immediately. Cancellation is by dropping the
/// future (the connection task is aborted), which also cancels the timer.
pub struct Poller {
    gateway: Arc<dyn TxGateway>,
    tx_hash: String,
    interval: Duration,
    max_consecutive_errors: Option<u32>,
}

impl Poller {
    pub fn new(gateway: Arc<dyn TxGateway>, tx_hash: impl Into<String>, interval: Duration) -> Self {
        Self {
            gateway,
            tx_hash: tx_hash.into(),
            interval,
            max_consecutive_errors: None,
        }
    }

    pub fn with_error_budget(mut self, max_consecutive_errors: Option<u32>) -> Self {
        self.max_consecutive_errors = max_consecutive_errors;
        self
    }

    pub async fn run<F>(&self, mut on_event: F) -> PollOutcome
    where
        F: FnMut(PollEvent),
    {
        let mut consecutive_errors = 0u32;
        let mut polls = 0u64;
        loop {
            polls += 1;
            match self.gateway.fetch_status(&self.tx_hash).await {
                Ok(Some(status)) => {
                    consecutive_errors = 0;
                    tracing::debug!(tx_hash = %self.tx_hash, state = %status.state, polls, "polled status");
                    let terminal = status.state.is_terminal();
                    on_event(PollEvent::Snapshot(status.clone()));
                    if terminal {
                        return PollOutcome::Terminal(status);
                    }
                }
                Ok(None) => {
                    consecutive_errors = 0;
                    tracing::debug!(tx_hash = %self.tx_hash, polls, "transaction not registered yet");
                    on_event(PollEvent::NotFound);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    tracing::warn!(tx_hash = %self.tx_hash, error = %e, consecutive_errors, "status poll failed");
                    let last_error = e.to_string();
                    on_event(PollEvent::Error(e));
                    if self
                        .max_consecutive_errors
                        .is_some_and(|max| consecutive_errors >= max)
                    {
                        return PollOutcome::ErrorBudgetExhausted {
                            errors: consecutive_errors,
                            last_error,
                        };
                    }
                }
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}
