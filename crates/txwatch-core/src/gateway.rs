//! The `TxGateway` trait — the backend that builds, registers and reports on
//! transactions.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde_json::Value;

use crate::error::GatewayError;
use crate::types::{BuildResponse, RegisterRequest, TxStatus};

/// Raw body chunks of an open event stream.
pub type ByteStream = BoxStream<'static, Result<Bytes, GatewayError>>;

/// Async client for the transaction gateway.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; the tracker shares one instance
/// across every connection task as `Arc<dyn TxGateway>`.
#[async_trait]
pub trait TxGateway: Send + Sync + 'static {
    /// `POST {base}/tx/{build_path}` with `params` as the JSON body.
    async fn build(&self, build_path: &str, params: &Value) -> Result<BuildResponse, GatewayError>;

    /// `POST {base}/tx/register`.
    async fn register(&self, req: &RegisterRequest) -> Result<(), GatewayError>;

    /// `GET {base}/tx/status/{tx_hash}`. `Ok(None)` when the gateway does
    /// not know the transaction yet.
    async fn fetch_status(&self, tx_hash: &str) -> Result<Option<TxStatus>, GatewayError>;

    /// `GET {base}/tx/stream/{tx_hash}` — open the event stream.
    async fn open_stream(&self, tx_hash: &str) -> Result<ByteStream, GatewayError>;

    /// The gateway's base URL.
    fn base_url(&self) -> &str;
}
