#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::StreamExt;
use serde_json::Value;

use txwatch_core::{
    BuildResponse, ByteStream, GatewayError, RegisterRequest, TxGateway, TxState, TxStatus,
};
use txwatch_tracker::{Notification, Notifier, WatchConfig};

type Chunk = Result<Bytes, GatewayError>;

enum StreamPlan {
    Refuse(u16, String),
    Live(mpsc::UnboundedReceiver<Chunk>),
}

/// In-memory gateway with scripted streams and poll replies.
#[derive(Default)]
pub struct MockGateway {
    streams: Mutex<HashMap<String, StreamPlan>>,
    polls: Mutex<HashMap<String, VecDeque<TxStatus>>>,
    poll_calls: AtomicU32,
}

/// Server side of a live event stream.
pub struct StreamFeed {
    tx: mpsc::UnboundedSender<Chunk>,
}

impl StreamFeed {
    pub fn event(&self, name: &str, data: Value) {
        let frame = format!("event: {name}\ndata: {data}\n\n");
        let _ = self.tx.unbounded_send(Ok(Bytes::from(frame)));
    }

    pub fn raw(&self, text: &'static str) {
        let _ = self.tx.unbounded_send(Ok(Bytes::from_static(text.as_bytes())));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.unbounded_send(Err(GatewayError::Stream(message.into())));
    }
}

impl MockGateway {
    pub fn live_stream(&self, tx_hash: &str) -> StreamFeed {
        let (tx, rx) = mpsc::unbounded();
        self.streams
            .lock()
            .unwrap()
            .insert(tx_hash.into(), StreamPlan::Live(rx));
        StreamFeed { tx }
    }

    pub fn refuse_stream(&self, tx_hash: &str, status: u16) {
        self.streams
            .lock()
            .unwrap()
            .insert(tx_hash.into(), StreamPlan::Refuse(status, "stream unavailable".into()));
    }

    pub fn script_polls(&self, tx_hash: &str, states: &[TxState]) {
        let replies = states
            .iter()
            .map(|&state| TxStatus {
                state,
                ..TxStatus::pending(tx_hash, "course_create")
            })
            .collect();
        self.polls.lock().unwrap().insert(tx_hash.into(), replies);
    }

    pub fn poll_calls(&self) -> u32 {
        self.poll_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TxGateway for MockGateway {
    async fn build(&self, _path: &str, _params: &Value) -> Result<BuildResponse, GatewayError> {
        Err(GatewayError::Other("build not scripted".into()))
    }

    async fn register(&self, _req: &RegisterRequest) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn fetch_status(&self, tx_hash: &str) -> Result<Option<TxStatus>, GatewayError> {
        self.poll_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .polls
            .lock()
            .unwrap()
            .get_mut(tx_hash)
            .and_then(VecDeque::pop_front))
    }

    async fn open_stream(&self, tx_hash: &str) -> Result<ByteStream, GatewayError> {
        match self.streams.lock().unwrap().remove(tx_hash) {
            Some(StreamPlan::Live(rx)) => Ok(rx.boxed()),
            Some(StreamPlan::Refuse(status, body)) => Err(GatewayError::from_response(status, &body)),
            None => Err(GatewayError::from_response(404, "no stream")),
        }
    }

    fn base_url(&self) -> &str {
        "mock://gateway"
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn notes(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.notes.lock().unwrap().push(notification);
    }
}

pub fn fast_config() -> WatchConfig {
    WatchConfig {
        poll_interval_ms: 20,
        ..Default::default()
    }
}

/// Wait up to two seconds for `cond` to hold.
pub async fn eventually(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..200 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {what}");
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(60)).await;
}
