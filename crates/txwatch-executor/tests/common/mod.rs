#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use txwatch_core::{
    BuildResponse, ByteStream, GatewayError, RegisterRequest, TxGateway, TxStatus,
};
use txwatch_executor::{TxExecutor, WalletError, WalletSigner};
use txwatch_tracker::{Notification, Notifier, WatchConfig, WatchRegistry};

/// Gateway with a scripted build reply. Streams are refused and status polls
/// report "unknown", so watched hashes stay pending.
pub struct MockGateway {
    build_reply: Mutex<Result<Value, (u16, String)>>,
    register_fails: AtomicBool,
    pub builds: Mutex<Vec<(String, Value)>>,
    pub registrations: Mutex<Vec<RegisterRequest>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self {
            build_reply: Mutex::new(Ok(json!({"unsigned_tx": "84a400"}))),
            register_fails: AtomicBool::new(false),
            builds: Mutex::new(Vec::new()),
            registrations: Mutex::new(Vec::new()),
        }
    }
}

impl MockGateway {
    pub fn reply_with(&self, body: Value) {
        *self.build_reply.lock().unwrap() = Ok(body);
    }

    pub fn refuse_build(&self, status: u16, body: &str) {
        *self.build_reply.lock().unwrap() = Err((status, body.to_string()));
    }

    pub fn fail_register(&self) {
        self.register_fails.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl TxGateway for MockGateway {
    async fn build(&self, build_path: &str, params: &Value) -> Result<BuildResponse, GatewayError> {
        self.builds
            .lock()
            .unwrap()
            .push((build_path.to_string(), params.clone()));
        let reply = self.build_reply.lock().unwrap().clone();
        match reply {
            Ok(body) => serde_json::from_value(body)
                .map_err(|e| GatewayError::MalformedResponse(e.to_string())),
            Err((status, body)) => Err(GatewayError::from_response(status, &body)),
        }
    }

    async fn register(&self, req: &RegisterRequest) -> Result<(), GatewayError> {
        self.registrations.lock().unwrap().push(req.clone());
        if self.register_fails.load(Ordering::SeqCst) {
            return Err(GatewayError::from_response(500, r#"{"error":"db down"}"#));
        }
        Ok(())
    }

    async fn fetch_status(&self, _tx_hash: &str) -> Result<Option<TxStatus>, GatewayError> {
        Ok(None)
    }

    async fn open_stream(&self, _tx_hash: &str) -> Result<ByteStream, GatewayError> {
        Err(GatewayError::from_response(404, "no stream"))
    }

    fn base_url(&self) -> &str {
        "mock://gateway"
    }
}

/// Wallet that signs by suffixing and submits by returning a fixed hash.
pub struct MockWallet {
    pub connected: AtomicBool,
    pub decline: AtomicBool,
    pub submit_error: Mutex<Option<String>>,
    pub signed: Mutex<Vec<(String, bool)>>,
    pub hash: String,
}

impl MockWallet {
    pub fn new(hash: &str) -> Self {
        Self {
            connected: AtomicBool::new(true),
            decline: AtomicBool::new(false),
            submit_error: Mutex::new(None),
            signed: Mutex::new(Vec::new()),
            hash: hash.to_string(),
        }
    }
}

#[async_trait]
impl WalletSigner for MockWallet {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn sign_tx(&self, unsigned_tx: &str, partial: bool) -> Result<String, WalletError> {
        self.signed
            .lock()
            .unwrap()
            .push((unsigned_tx.to_string(), partial));
        if self.decline.load(Ordering::SeqCst) {
            return Err(WalletError::Declined);
        }
        Ok(format!("{unsigned_tx}-signed"))
    }

    async fn submit_tx(&self, _signed_tx: &str) -> Result<String, WalletError> {
        match self.submit_error.lock().unwrap().clone() {
            Some(msg) => Err(WalletError::Other(msg)),
            None => Ok(self.hash.clone()),
        }
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn all(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

pub struct Harness {
    pub gateway: Arc<MockGateway>,
    pub wallet: Arc<MockWallet>,
    pub notifier: Arc<RecordingNotifier>,
    pub registry: WatchRegistry,
}

impl Harness {
    pub fn new(hash: &str) -> Self {
        let gateway = Arc::new(MockGateway::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let config = WatchConfig {
            poll_interval_ms: 60_000,
            ..WatchConfig::default()
        };
        let registry = WatchRegistry::new(gateway.clone(), notifier.clone(), config);
        Self {
            gateway,
            wallet: Arc::new(MockWallet::new(hash)),
            notifier,
            registry,
        }
    }

    pub fn executor(&self) -> TxExecutor {
        TxExecutor::new(
            self.gateway.clone(),
            self.wallet.clone(),
            self.registry.clone(),
            self.notifier.clone(),
        )
    }
}
