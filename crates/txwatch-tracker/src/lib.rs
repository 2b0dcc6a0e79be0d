//! # txwatch-tracker
//!
//! Follows submitted transactions until the gateway reports a terminal
//! state, and fans the progress out to any number of observers.
//!
//! ## Architecture
//! ```text
//! WatchRegistry::watch(hash)
//!       │  (one per hash, owned by the registry)
//!       ▼
//! ConnectionManager ── event stream ──► SseDecoder ──► TxStreamEvent
//!       │  stream fails / ends early
//!       ▼
//! Poller ── GET /tx/status/{hash} every poll interval
//!       │
//!       ▼
//! WatchRegistry record ──► watch::Sender<TxRecord> ──► TxObserver (many)
//!                     └──► Notifier (only when nobody is observing)
//! ```

pub mod config;
pub mod connection;
pub mod notify;
pub mod observer;
pub mod polling;
pub mod record;
pub mod registry;

pub use config::WatchConfig;
pub use connection::{ConnectionHandle, ConnectionManager, StatusSink};
pub use notify::{LogNotifier, Notification, NotificationLevel, Notifier};
pub use observer::{CompletionCallback, TxObserver, TxView};
pub use polling::{PollEvent, PollOutcome, Poller};
pub use record::{ConnectionPhase, StatusUpdate, TxRecord};
pub use registry::WatchRegistry;
