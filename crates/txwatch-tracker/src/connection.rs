//! Connection manager: one status connection per watched transaction.
//!
//! ```text
//! connecting ─► streaming ─► finished
//!      │            │
//!      └─ error ────┴─ error / early EOF ─► polling ─► finished
//!                                              └─ error budget ─► closed
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use txwatch_core::{SseDecoder, TxGateway, TxStreamEvent};

use crate::config::WatchConfig;
use crate::polling::{PollEvent, PollOutcome, Poller};
use crate::record::{ConnectionPhase, StatusUpdate};

/// Receives every update a connection produces.
pub trait StatusSink: Send + Sync + 'static {
    fn publish(&self, tx_hash: &str, update: StatusUpdate);
}

/// Owner's handle on a running connection. Dropping it tears the
/// connection down.
pub struct ConnectionHandle {
    tx_hash: String,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Abort the stream read or poll timer. No update is published after
    /// this returns.
    pub fn close(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            tracing::debug!(tx_hash = %self.tx_hash, "closing connection");
        }
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("tx_hash", &self.tx_hash)
            .field("cancelled", &self.cancelled.load(Ordering::Relaxed))
            .finish()
    }
}

enum StreamOutcome {
    Terminal,
    Failed(String),
}

/// Streams status events for one transaction, falling back to polling.
pub struct ConnectionManager {
    tx_hash: String,
    gateway: Arc<dyn TxGateway>,
    sink: Arc<dyn StatusSink>,
    config: WatchConfig,
    cancelled: Arc<AtomicBool>,
}

impl ConnectionManager {
    /// Start the connection on the current Tokio runtime.
    pub fn spawn(
        tx_hash: impl Into<String>,
        gateway: Arc<dyn TxGateway>,
        sink: Arc<dyn StatusSink>,
        config: WatchConfig,
    ) -> ConnectionHandle {
        let tx_hash = tx_hash.into();
        let cancelled = Arc::new(AtomicBool::new(false));
        let manager = Self {
            tx_hash: tx_hash.clone(),
            gateway,
            sink,
            config,
            cancelled: Arc::clone(&cancelled),
        };
        let task = tokio::spawn(manager.run());
        ConnectionHandle {
            tx_hash,
            cancelled,
            task,
        }
    }

    async fn run(self) {
        self.emit(StatusUpdate::Phase(ConnectionPhase::Connecting));

        match self.stream().await {
            StreamOutcome::Terminal => {
                tracing::info!(tx_hash = %self.tx_hash, "stream delivered terminal state");
                self.emit(StatusUpdate::Phase(ConnectionPhase::Finished));
                return;
            }
            StreamOutcome::Failed(reason) => {
                tracing::warn!(tx_hash = %self.tx_hash, reason = %reason, "status stream failed, falling back to polling");
                self.emit(StatusUpdate::TransportError(reason));
            }
        }

        self.emit(StatusUpdate::Phase(ConnectionPhase::Polling));
        let poller = Poller::new(
            Arc::clone(&self.gateway),
            self.tx_hash.clone(),
            self.config.poll_interval(),
        )
        .with_error_budget(self.config.max_consecutive_poll_errors);

        let outcome = poller
            .run(|event| match event {
                PollEvent::Snapshot(status) => self.emit(StatusUpdate::Snapshot(status)),
                PollEvent::NotFound => {}
                PollEvent::Error(e) => self.emit(StatusUpdate::TransportError(e.to_string())),
            })
            .await;

        match outcome {
            PollOutcome::Terminal(status) => {
                tracing::info!(tx_hash = %self.tx_hash, state = %status.state, "polling reached terminal state");
                self.emit(StatusUpdate::Phase(ConnectionPhase::Finished));
            }
            PollOutcome::ErrorBudgetExhausted { errors, last_error } => {
                tracing::error!(tx_hash = %self.tx_hash, errors, error = %last_error, "giving up on status polling");
                self.emit(StatusUpdate::Phase(ConnectionPhase::Closed));
            }
        }
    }

    async fn stream(&self) -> StreamOutcome {
        let mut body = match self.gateway.open_stream(&self.tx_hash).await {
            Ok(body) => body,
            Err(e) => return StreamOutcome::Failed(e.to_string()),
        };
        self.emit(StatusUpdate::Phase(ConnectionPhase::Streaming));

        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => return StreamOutcome::Failed(e.to_string()),
            };
            for frame in decoder.push(&chunk) {
                let Some(event) = TxStreamEvent::from_frame(&frame) else {
                    continue;
                };
                let completed = matches!(event, TxStreamEvent::Complete(_));
                if self.handle_event(event) {
                    return StreamOutcome::Terminal;
                }
                if completed {
                    return StreamOutcome::Failed(
                        "stream completed without a terminal state".into(),
                    );
                }
            }
        }
        StreamOutcome::Failed("stream closed before a terminal event".into())
    }

    /// Publish the update carried by `event`; `true` if it was terminal.
    fn handle_event(&self, event: TxStreamEvent) -> bool {
        let terminal = event.is_terminal();
        match event {
            TxStreamEvent::State(status) => {
                if !status.tx_hash.is_empty() && status.tx_hash != self.tx_hash {
                    tracing::warn!(tx_hash = %self.tx_hash, got = %status.tx_hash, "snapshot for another transaction");
                    return false;
                }
                tracing::debug!(tx_hash = %self.tx_hash, state = %status.state, "state snapshot");
                self.emit(StatusUpdate::Snapshot(status));
            }
            TxStreamEvent::StateChange(change) => {
                tracing::debug!(
                    tx_hash = %self.tx_hash,
                    from = ?change.previous_state,
                    to = %change.new_state,
                    "state change"
                );
                self.emit(StatusUpdate::Transition(change.new_state));
            }
            TxStreamEvent::Complete(done) => {
                self.emit(StatusUpdate::Complete(done.final_state));
            }
        }
        terminal
    }

    fn emit(&self, update: StatusUpdate) {
        if self.cancelled.load(Ordering::SeqCst) {
            return;
        }
        self.sink.publish(&self.tx_hash, update);
    }
}
