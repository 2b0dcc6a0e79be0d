//! The canonical per-transaction record and the updates that mutate it.

use chrono::{DateTime, Utc};
use serde::Serialize;

use txwatch_core::codec::FinalState;
use txwatch_core::{TxKind, TxMetadata, TxState, TxStatus};

/// Where the record's connection currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPhase {
    /// No connection has been started (observer attached before `watch`).
    Idle,
    Connecting,
    Streaming,
    Polling,
    /// The gateway reported a terminal state; the connection ended.
    Finished,
    /// The connection gave up or was torn down before a terminal state.
    Closed,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Polling => "polling",
            Self::Finished => "finished",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A change reported by a connection.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// Full snapshot (`state` event or a poll result).
    Snapshot(TxStatus),
    /// `state_change` event: new state on top of the stored status.
    Transition(TxState),
    /// `complete` event.
    Complete(FinalState),
    Phase(ConnectionPhase),
    /// Stream or poll failure; informational, tracking continues.
    TransportError(String),
}

/// Everything the registry knows about one transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxRecord {
    pub id: String,
    pub kind: Option<TxKind>,
    /// Kind name as reported by the gateway.
    pub tx_type: String,
    pub state: TxState,
    pub last_error: Option<String>,
    pub retry_count: u32,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub subscriber_count: usize,
    pub metadata: TxMetadata,
    pub connection: ConnectionPhase,
    pub transport_error: Option<String>,
    /// `false` while the record only exists because an observer attached early.
    pub watched: bool,
    /// Bumped on every applied update.
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

impl TxRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: None,
            tx_type: String::new(),
            state: TxState::Pending,
            last_error: None,
            retry_count: 0,
            confirmed_at: None,
            subscriber_count: 0,
            metadata: TxMetadata::new(),
            connection: ConnectionPhase::Idle,
            transport_error: None,
            watched: false,
            revision: 0,
            updated_at: Utc::now(),
        }
    }

    /// Chain-confirmed with a sync error reported by the gateway.
    pub fn is_stalled(&self) -> bool {
        self.state == TxState::Confirmed
            && self
                .last_error
                .as_deref()
                .is_some_and(|e| !e.trim().is_empty())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal() || self.is_stalled()
    }

    /// `updated`, or stalled (on chain, sync lagging).
    pub fn is_success(&self) -> bool {
        self.state == TxState::Updated || self.is_stalled()
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failure()
    }

    /// The record as a gateway status.
    pub fn status(&self) -> TxStatus {
        TxStatus {
            tx_hash: self.id.clone(),
            tx_type: self.tx_type.clone(),
            state: self.state,
            retry_count: self.retry_count,
            confirmed_at: self.confirmed_at,
            last_error: self.last_error.clone(),
        }
    }

    /// Apply `update`. Returns `true` if anything changed.
    pub fn apply(&mut self, update: StatusUpdate) -> bool {
        let before = self.clone();
        match update {
            StatusUpdate::Snapshot(status) => {
                if self.is_older(&status) {
                    tracing::debug!(
                        tx_hash = %self.id,
                        stored = %self.state,
                        incoming = %status.state,
                        "dropping stale status snapshot"
                    );
                    return false;
                }
                self.apply_status(status);
            }
            StatusUpdate::Transition(state) => self.state = state,
            StatusUpdate::Complete(FinalState::Status(status)) => self.apply_status(status),
            StatusUpdate::Complete(FinalState::State(state)) => self.state = state,
            StatusUpdate::Phase(phase) => {
                self.connection = phase;
                if phase == ConnectionPhase::Streaming {
                    self.transport_error = None;
                }
            }
            StatusUpdate::TransportError(message) => self.transport_error = Some(message),
        }
        *self != before
    }

    /// A snapshot is older if it would reopen a terminal record or carries a
    /// lower retry count than the one stored.
    fn is_older(&self, incoming: &TxStatus) -> bool {
        (self.state.is_terminal() && !incoming.state.is_terminal())
            || incoming.retry_count < self.retry_count
    }

    fn apply_status(&mut self, status: TxStatus) {
        if !status.tx_type.is_empty() {
            self.tx_type = status.tx_type;
        }
        self.state = status.state;
        self.retry_count = self.retry_count.max(status.retry_count);
        self.last_error = status.last_error;
        if status.confirmed_at.is_some() {
            self.confirmed_at = status.confirmed_at;
        }
    }
}
