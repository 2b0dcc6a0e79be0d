//! The watch registry: the single owner of transaction records and their
//! connections.
//!
//! Records outlive the observers that look at them. When a record reaches a
//! terminal outcome the registry decides who tells the user: attached
//! observers render it themselves, so the registry only emits its own
//! notification when nobody is attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use once_cell::sync::OnceCell;
use tokio::sync::watch;

use txwatch_core::{TxGateway, TxKind, TxMetadata};

use crate::config::WatchConfig;
use crate::connection::{ConnectionHandle, ConnectionManager, StatusSink};
use crate::notify::{Notification, NotificationLevel, Notifier};
use crate::record::{ConnectionPhase, StatusUpdate, TxRecord};

static GLOBAL: OnceCell<WatchRegistry> = OnceCell::new();

struct Entry {
    record: TxRecord,
    updates: watch::Sender<TxRecord>,
    connection: Option<ConnectionHandle>,
    /// Set once a stall (on chain, sync lagging) has been reported.
    stall_reported: bool,
    /// Set once the gateway's terminal state has been reported (or left to
    /// observers). Closes the registry's reporting for this record.
    outcome_reported: bool,
}

impl Entry {
    fn new(id: &str) -> Self {
        let record = TxRecord::new(id);
        let (updates, _) = watch::channel(record.clone());
        Self {
            record,
            updates,
            connection: None,
            stall_reported: false,
            outcome_reported: false,
        }
    }

    fn publish(&mut self) {
        self.record.revision += 1;
        self.record.updated_at = Utc::now();
        self.updates.send_replace(self.record.clone());
    }
}

struct RegistryInner {
    gateway: Arc<dyn TxGateway>,
    notifier: Arc<dyn Notifier>,
    config: WatchConfig,
    entries: Mutex<HashMap<String, Entry>>,
}

impl RegistryInner {
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn apply(&self, tx_hash: &str, update: StatusUpdate) {
        let report = {
            let mut entries = self.entries();
            let Some(entry) = entries.get_mut(tx_hash) else {
                return;
            };
            if entry.connection.is_none() {
                // torn down; late updates from an aborting task are dropped
                return;
            }
            if !entry.record.apply(update) {
                return;
            }
            entry.publish();

            report_for(entry)
        };

        if let Some(record) = report {
            self.notifier.notify(outcome_notification(&record, &self.config));
        }
    }
}

/// Decide whether `entry`'s latest change needs a registry notification.
///
/// A stall is reported once, and only when nobody observes it. The gateway's
/// terminal state is reported once as well. A failure that follows a stall is
/// reported even to observed records: their completion callbacks already
/// fired for the stall.
fn report_for(entry: &mut Entry) -> Option<TxRecord> {
    if entry.outcome_reported {
        return None;
    }
    let record = &entry.record;
    let observed = record.subscriber_count > 0;

    if record.state.is_terminal() {
        entry.outcome_reported = true;
        let after_stall = entry.stall_reported;
        tracing::info!(
            tx_hash = %record.id,
            state = %record.state,
            observers = record.subscriber_count,
            after_stall,
            "transaction reached terminal outcome"
        );
        let notify = !observed || (after_stall && record.is_failed());
        return notify.then(|| record.clone());
    }

    if record.is_stalled() && !entry.stall_reported {
        entry.stall_reported = true;
        tracing::info!(
            tx_hash = %record.id,
            observers = record.subscriber_count,
            "transaction confirmed, sync delayed"
        );
        return (!observed).then(|| record.clone());
    }
    None
}

struct RegistrySink {
    inner: Weak<RegistryInner>,
}

impl StatusSink for RegistrySink {
    fn publish(&self, tx_hash: &str, update: StatusUpdate) {
        if let Some(inner) = self.inner.upgrade() {
            inner.apply(tx_hash, update);
        }
    }
}

/// Process-wide table of watched transactions.
///
/// Cheap to clone; every clone shares the same table. Tests build isolated
/// registries with [`WatchRegistry::new`]; applications may install one as
/// the process-wide instance with [`WatchRegistry::install_global`].
#[derive(Clone)]
pub struct WatchRegistry {
    inner: Arc<RegistryInner>,
}

impl WatchRegistry {
    pub fn new(gateway: Arc<dyn TxGateway>, notifier: Arc<dyn Notifier>, config: WatchConfig) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                gateway,
                notifier,
                config,
                entries: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Make this registry the process-wide instance. Fails (returning the
    /// registry) if one is already installed.
    pub fn install_global(self) -> Result<(), WatchRegistry> {
        GLOBAL.set(self)
    }

    pub fn global() -> Option<&'static WatchRegistry> {
        GLOBAL.get()
    }

    pub fn config(&self) -> &WatchConfig {
        &self.inner.config
    }

    /// Start tracking `tx_hash`.
    ///
    /// Idempotent: if a connection already exists only `kind` (when not yet
    /// known) and `metadata` are merged in. A connection that gave up before
    /// a terminal state is restarted. Must be called from within a Tokio
    /// runtime.
    pub fn watch(&self, tx_hash: &str, kind: Option<TxKind>, metadata: TxMetadata) {
        let mut entries = self.inner.entries();
        let entry = entries
            .entry(tx_hash.to_string())
            .or_insert_with(|| Entry::new(tx_hash));

        if entry.record.kind.is_none() {
            entry.record.kind = kind;
        }
        entry.record.metadata.extend(metadata);
        entry.record.watched = true;
        if entry.record.tx_type.is_empty() {
            if let Some(kind) = entry.record.kind {
                entry.record.tx_type = kind.config().gateway_name.to_string();
            }
        }

        let needs_connection = match &entry.connection {
            None => true,
            Some(_) => {
                entry.record.connection == ConnectionPhase::Closed && !entry.record.is_terminal()
            }
        };

        if needs_connection {
            tracing::info!(tx_hash, kind = ?entry.record.kind, "watching transaction");
            entry.record.connection = ConnectionPhase::Connecting;
            // spawned under the lock: the task's first update waits until the
            // handle is stored
            entry.connection = Some(ConnectionManager::spawn(
                tx_hash,
                Arc::clone(&self.inner.gateway),
                Arc::new(RegistrySink {
                    inner: Arc::downgrade(&self.inner),
                }),
                self.inner.config.clone(),
            ));
        } else {
            tracing::debug!(tx_hash, "already watching, metadata merged");
        }
        entry.publish();
    }

    /// Snapshot of a watched transaction.
    pub fn get_watched_tx(&self, tx_hash: &str) -> Option<TxRecord> {
        self.inner
            .entries()
            .get(tx_hash)
            .filter(|e| e.record.watched)
            .map(|e| e.record.clone())
    }

    /// Receive every record update for `tx_hash`. Creates an unwatched
    /// placeholder if the hash is unknown, so an observer may attach before
    /// `watch` is called.
    pub fn subscribe(&self, tx_hash: &str) -> watch::Receiver<TxRecord> {
        self.inner
            .entries()
            .entry(tx_hash.to_string())
            .or_insert_with(|| Entry::new(tx_hash))
            .updates
            .subscribe()
    }

    /// Returns the new subscriber count.
    pub fn increment_subscriber(&self, tx_hash: &str) -> usize {
        let mut entries = self.inner.entries();
        let entry = entries
            .entry(tx_hash.to_string())
            .or_insert_with(|| Entry::new(tx_hash));
        entry.record.subscriber_count += 1;
        entry.publish();
        entry.record.subscriber_count
    }

    /// Returns the new subscriber count. Never goes below zero.
    pub fn decrement_subscriber(&self, tx_hash: &str) -> usize {
        let mut entries = self.inner.entries();
        let Some(entry) = entries.get_mut(tx_hash) else {
            tracing::warn!(tx_hash, "decrement for unknown transaction");
            return 0;
        };
        if entry.record.subscriber_count == 0 {
            tracing::warn!(tx_hash, "subscriber count already zero");
            return 0;
        }
        entry.record.subscriber_count -= 1;
        entry.publish();
        entry.record.subscriber_count
    }

    /// Tear down the connection and forget the record.
    pub fn unwatch(&self, tx_hash: &str) -> Option<TxRecord> {
        let entry = self.inner.entries().remove(tx_hash)?;
        if let Some(conn) = &entry.connection {
            conn.close();
        }
        tracing::debug!(tx_hash, "unwatched transaction");
        Some(entry.record)
    }

    /// Tear down every connection. Records stay readable.
    pub fn shutdown(&self) {
        let mut entries = self.inner.entries();
        for (tx_hash, entry) in entries.iter_mut() {
            if let Some(conn) = entry.connection.take() {
                conn.close();
                if !entry.record.is_terminal() {
                    entry.record.connection = ConnectionPhase::Closed;
                    entry.publish();
                }
                tracing::debug!(tx_hash = %tx_hash, "connection shut down");
            }
        }
    }

    /// Hashes currently being watched.
    pub fn watched_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .entries()
            .iter()
            .filter(|(_, e)| e.record.watched)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for WatchRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRegistry")
            .field("gateway", &self.inner.gateway.base_url())
            .field("entries", &self.inner.entries().len())
            .finish()
    }
}

fn outcome_notification(record: &TxRecord, config: &WatchConfig) -> Notification {
    let success_text = record
        .kind
        .or_else(|| TxKind::from_gateway_name(&record.tx_type))
        .map(|k| k.config().success_message);
    let title = record
        .metadata
        .get("title")
        .cloned()
        .or_else(|| success_text.map(str::to_string))
        .unwrap_or_else(|| "Transaction".to_string());
    let detail = record.last_error.as_deref().unwrap_or("no details");

    let (level, message) = if record.is_stalled() {
        (
            NotificationLevel::Warning,
            format!("Confirmed on chain, but syncing is delayed: {detail}"),
        )
    } else if record.is_failed() {
        let message = match record.state {
            txwatch_core::TxState::Expired => "Transaction expired before confirmation".to_string(),
            _ => format!("Transaction failed: {detail}"),
        };
        (NotificationLevel::Error, message)
    } else {
        (
            NotificationLevel::Success,
            success_text.unwrap_or("Transaction confirmed").to_string(),
        )
    };

    Notification {
        key: record.id.clone(),
        level,
        title,
        message,
        explorer_url: config.explorer_url(&record.id),
    }
}
