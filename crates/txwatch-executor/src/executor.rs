//! The transaction executor.
//!
//! Runs one transaction through validate → build → sign → submit, hands the
//! resulting hash to the watch registry and reports progress through an
//! [`ExecutionState`] channel.

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::watch;

use txwatch_core::{GatewayError, RegisterRequest, TxGateway, TxKind, TxMetadata};
use txwatch_tracker::{Notification, NotificationLevel, Notifier, WatchRegistry};

use crate::error::ExecuteError;
use crate::validation::SchemaRegistry;
use crate::wallet::WalletSigner;

/// Where the executor is in its pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    Idle,
    Fetching,
    Signing,
    Submitting,
    Success,
    Error,
}

impl ExecutionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Signing => "signing",
            Self::Submitting => "submitting",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// `true` while a transaction is in flight.
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Fetching | Self::Signing | Self::Submitting)
    }
}

impl std::fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Block explorer prefix for transaction links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explorer_base_url: Option<String>,
}

impl ExecutorConfig {
    pub fn explorer_url(&self, tx_hash: &str) -> Option<String> {
        self.explorer_base_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), tx_hash))
    }
}

/// Outcome of a successful [`TxExecutor::execute`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxResult {
    pub tx_hash: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explorer_url: Option<String>,
    pub requires_db_update: bool,
    pub requires_onchain_confirmation: bool,
    /// Extra fields of the build response (created entity ids and the like).
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

pub type SuccessCallback = Arc<dyn Fn(&TxResult) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&ExecuteError) + Send + Sync>;

/// Per-call options.
#[derive(Clone, Default)]
pub struct ExecuteOptions {
    pub skip_validation: bool,
    /// Passed to the gateway on registration and stored on the watched
    /// record. A `"title"` entry names the transaction in notifications.
    pub metadata: TxMetadata,
    pub on_success: Option<SuccessCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl ExecuteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn skip_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: Fn(&TxResult) + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: Fn(&ExecuteError) + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for ExecuteOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecuteOptions")
            .field("skip_validation", &self.skip_validation)
            .field("metadata", &self.metadata)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Builds, signs and submits transactions, then hands them to a
/// [`WatchRegistry`].
pub struct TxExecutor {
    gateway: Arc<dyn TxGateway>,
    wallet: Arc<dyn WalletSigner>,
    registry: WatchRegistry,
    notifier: Arc<dyn Notifier>,
    schemas: SchemaRegistry,
    config: ExecutorConfig,
    state: watch::Sender<ExecutionState>,
    last_result: Mutex<Option<TxResult>>,
    last_error: Mutex<Option<ExecuteError>>,
}

impl TxExecutor {
    pub fn new(
        gateway: Arc<dyn TxGateway>,
        wallet: Arc<dyn WalletSigner>,
        registry: WatchRegistry,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (state, _) = watch::channel(ExecutionState::Idle);
        Self {
            gateway,
            wallet,
            registry,
            notifier,
            schemas: SchemaRegistry::default(),
            config: ExecutorConfig::default(),
            state,
            last_result: Mutex::new(None),
            last_error: Mutex::new(None),
        }
    }

    pub fn with_schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn state(&self) -> ExecutionState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ExecutionState> {
        self.state.subscribe()
    }

    pub fn last_result(&self) -> Option<TxResult> {
        lock(&self.last_result).clone()
    }

    pub fn last_error(&self) -> Option<ExecuteError> {
        lock(&self.last_error).clone()
    }

    /// Back to `idle`, forgetting the last result and error.
    pub fn reset(&self) {
        *lock(&self.last_result) = None;
        *lock(&self.last_error) = None;
        self.set_state(ExecutionState::Idle);
    }

    /// Run `kind` with `params` through the whole pipeline.
    ///
    /// Signing may wait indefinitely on the wallet. Registration with the
    /// gateway is best effort; the hash is watched either way when the kind
    /// needs tracking.
    pub async fn execute(
        &self,
        kind: TxKind,
        params: Value,
        options: ExecuteOptions,
    ) -> Result<TxResult, ExecuteError> {
        *lock(&self.last_result) = None;
        *lock(&self.last_error) = None;
        match self.run(kind, &params, &options).await {
            Ok(result) => {
                *lock(&self.last_result) = Some(result.clone());
                self.set_state(ExecutionState::Success);
                if let Some(cb) = &options.on_success {
                    cb(&result);
                }
                Ok(result)
            }
            Err(err) => {
                tracing::warn!(kind = %kind, error = %err, "transaction execution failed");
                *lock(&self.last_error) = Some(err.clone());
                self.set_state(ExecutionState::Error);
                if let Some(cb) = &options.on_error {
                    cb(&err);
                }
                self.notifier.notify(Notification {
                    key: kind.config().gateway_name.to_string(),
                    level: NotificationLevel::Error,
                    title: title_for(kind, &options.metadata),
                    message: err.to_string(),
                    explorer_url: None,
                });
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        kind: TxKind,
        params: &Value,
        options: &ExecuteOptions,
    ) -> Result<TxResult, ExecuteError> {
        let cfg = kind.config();

        if !self.wallet.is_connected() {
            return Err(ExecuteError::NotConnected);
        }
        if !options.skip_validation {
            self.schemas
                .validate(kind, params)
                .map_err(ExecuteError::InvalidParameters)?;
        }

        self.set_state(ExecutionState::Fetching);
        let built = self
            .gateway
            .build(cfg.build_path, params)
            .await
            .map_err(build_error)?;

        self.set_state(ExecutionState::Signing);
        let signed = self
            .wallet
            .sign_tx(&built.unsigned_tx, true)
            .await
            .map_err(|e| ExecuteError::SigningFailed(e.to_string()))?;

        self.set_state(ExecutionState::Submitting);
        let tx_hash = self
            .wallet
            .submit_tx(&signed)
            .await
            .map_err(|e| ExecuteError::SubmitFailed(e.to_string()))?;
        tracing::info!(tx_hash = %tx_hash, kind = %kind, "transaction submitted");

        let explorer_url = self.config.explorer_url(&tx_hash);
        let title = title_for(kind, &options.metadata);

        if cfg.requires_tracking() {
            self.notifier.notify(Notification {
                key: tx_hash.clone(),
                level: NotificationLevel::Pending,
                title,
                message: "Transaction submitted, waiting for confirmation".into(),
                explorer_url: explorer_url.clone(),
            });

            let req = RegisterRequest {
                tx_hash: tx_hash.clone(),
                tx_type: cfg.gateway_name.to_string(),
                metadata: (!options.metadata.is_empty()).then(|| options.metadata.clone()),
            };
            if let Err(e) = self.gateway.register(&req).await {
                tracing::warn!(tx_hash = %tx_hash, error = %e, "failed to register transaction, watching anyway");
            }
            self.registry
                .watch(&tx_hash, Some(kind), options.metadata.clone());
        } else {
            self.notifier.notify(Notification {
                key: tx_hash.clone(),
                level: NotificationLevel::Success,
                title,
                message: cfg.success_message.to_string(),
                explorer_url: explorer_url.clone(),
            });
        }

        Ok(TxResult {
            tx_hash,
            success: true,
            explorer_url,
            requires_db_update: cfg.requires_db_update,
            requires_onchain_confirmation: cfg.requires_onchain_confirmation,
            extra: built.extra,
        })
    }

    fn set_state(&self, state: ExecutionState) {
        tracing::debug!(state = %state, "execution state");
        self.state.send_replace(state);
    }
}

impl std::fmt::Debug for TxExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TxExecutor")
            .field("gateway", &self.gateway.base_url())
            .field("state", &self.state())
            .field("config", &self.config)
            .finish()
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_error(err: GatewayError) -> ExecuteError {
    match err {
        GatewayError::Status { message, .. } if !message.is_empty() => {
            ExecuteError::BuildFailed(message)
        }
        other => ExecuteError::BuildFailed(other.to_string()),
    }
}

fn title_for(kind: TxKind, metadata: &TxMetadata) -> String {
    metadata
        .get("title")
        .cloned()
        .unwrap_or_else(|| kind.config().success_message.to_string())
}
