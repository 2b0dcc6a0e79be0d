//! The wallet seam: signing and broadcasting are delegated to an external
//! wallet the executor treats as a black box.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum WalletError {
    #[error("user declined")]
    Declined,
    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait WalletSigner: Send + Sync + 'static {
    fn is_connected(&self) -> bool;

    /// Sign `unsigned_tx`. With `partial` the wallet adds its witnesses
    /// without requiring the transaction to be fully signed. May wait
    /// indefinitely for the user.
    async fn sign_tx(&self, unsigned_tx: &str, partial: bool) -> Result<String, WalletError>;

    /// Broadcast `signed_tx` and return the transaction hash.
    async fn submit_tx(&self, signed_tx: &str) -> Result<String, WalletError>;
}
