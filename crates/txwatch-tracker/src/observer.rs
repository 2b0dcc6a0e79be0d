//! Observer adapter: a per-consumer view over one watched transaction.
//!
//! The observer never owns a connection. It reads the registry's record,
//! derives the outcome predicates, and fires its completion callback at most
//! once per attachment. The one-shot latch survives re-attaching to the same
//! hash and resets only when a different hash is attached.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::record::TxRecord;
use crate::registry::WatchRegistry;

/// Called once when the observed transaction reaches a terminal outcome.
pub type CompletionCallback = Arc<dyn Fn(&TxView) + Send + Sync>;

/// What an observer shows its consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct TxView {
    /// `None` until the hash is watched.
    pub status: Option<TxRecord>,
    pub is_terminal: bool,
    pub is_success: bool,
    pub is_failed: bool,
    pub is_stalled: bool,
}

impl TxView {
    pub fn empty() -> Self {
        Self::from_record(None)
    }

    fn from_record(record: Option<&TxRecord>) -> Self {
        let record = record.filter(|r| r.watched);
        Self {
            status: record.cloned(),
            is_terminal: record.is_some_and(TxRecord::is_terminal),
            is_success: record.is_some_and(TxRecord::is_success),
            is_failed: record.is_some_and(TxRecord::is_failed),
            is_stalled: record.is_some_and(TxRecord::is_stalled),
        }
    }
}

struct Attachment {
    tx_hash: String,
    alive: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// A consumer's attachment point to the registry.
pub struct TxObserver {
    registry: WatchRegistry,
    on_complete: Option<CompletionCallback>,
    attachment: Option<Attachment>,
    fired: Arc<AtomicBool>,
    latched_hash: Option<String>,
    views: Arc<watch::Sender<TxView>>,
}

impl TxObserver {
    pub fn new(registry: WatchRegistry) -> Self {
        let (views, _) = watch::channel(TxView::empty());
        Self {
            registry,
            on_complete: None,
            attachment: None,
            fired: Arc::new(AtomicBool::new(false)),
            latched_hash: None,
            views: Arc::new(views),
        }
    }

    /// Set the completion callback used by subsequent attachments.
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TxView) + Send + Sync + 'static,
    {
        self.on_complete = Some(Arc::new(callback));
        self
    }

    /// Attach to `tx_hash`, detaching from any previous hash first. Must be
    /// called from within a Tokio runtime.
    pub fn attach(&mut self, tx_hash: &str) -> TxView {
        self.detach();

        if self.latched_hash.as_deref() != Some(tx_hash) {
            self.fired = Arc::new(AtomicBool::new(false));
            self.latched_hash = Some(tx_hash.to_string());
        }

        self.registry.increment_subscriber(tx_hash);
        let mut rx = self.registry.subscribe(tx_hash);
        let alive = Arc::new(AtomicBool::new(true));

        let view = current_view(&mut rx);
        self.views.send_replace(view.clone());
        if view.is_terminal {
            fire_once(&alive, &self.fired, self.on_complete.as_ref(), &view);
        }

        let task = {
            let alive = Arc::clone(&alive);
            let fired = Arc::clone(&self.fired);
            let callback = self.on_complete.clone();
            let views = Arc::clone(&self.views);
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let view = current_view(&mut rx);
                    if !alive.load(Ordering::SeqCst) {
                        break;
                    }
                    views.send_replace(view.clone());
                    if view.is_terminal {
                        fire_once(&alive, &fired, callback.as_ref(), &view);
                    }
                }
            })
        };

        tracing::debug!(tx_hash, "observer attached");
        self.attachment = Some(Attachment {
            tx_hash: tx_hash.to_string(),
            alive,
            task,
        });
        view
    }

    /// Stop observing. Calling it when not attached does nothing.
    pub fn detach(&mut self) {
        let Some(att) = self.attachment.take() else {
            return;
        };
        att.alive.store(false, Ordering::SeqCst);
        att.task.abort();
        self.registry.decrement_subscriber(&att.tx_hash);
        tracing::debug!(tx_hash = %att.tx_hash, "observer detached");
    }

    pub fn attached_hash(&self) -> Option<&str> {
        self.attachment.as_ref().map(|a| a.tx_hash.as_str())
    }

    /// The latest view.
    pub fn view(&self) -> TxView {
        self.views.borrow().clone()
    }

    /// Follow view changes.
    pub fn views(&self) -> watch::Receiver<TxView> {
        self.views.subscribe()
    }

    /// Wait until the observed transaction reaches a terminal outcome.
    pub async fn wait_for_terminal(&self) -> TxView {
        let mut rx = self.views.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let view = match rx.wait_for(|v| v.is_terminal).await {
            Ok(view) => view.clone(),
            Err(_) => self.view(),
        };
        view
    }
}

impl Drop for TxObserver {
    fn drop(&mut self) {
        self.detach();
    }
}

fn current_view(rx: &mut watch::Receiver<TxRecord>) -> TxView {
    let record = rx.borrow_and_update();
    TxView::from_record(Some(&*record))
}

fn fire_once(
    alive: &AtomicBool,
    fired: &AtomicBool,
    callback: Option<&CompletionCallback>,
    view: &TxView,
) {
    if !alive.load(Ordering::SeqCst) {
        return;
    }
    if fired.swap(true, Ordering::SeqCst) {
        return;
    }
    if let Some(cb) = callback {
        cb(view);
    }
}
