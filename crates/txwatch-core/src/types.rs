//! Gateway wire types: transaction state, status snapshot, build and
//! register envelopes.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form annotations attached to a watched transaction (e.g. `title`).
pub type TxMetadata = BTreeMap<String, String>;

/// Confirmation state as reported by the gateway.
///
/// `Updated`, `Failed` and `Expired` are terminal. `Confirmed` only means the
/// transaction is on chain; derived database updates may still be pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxState {
    Pending,
    Confirmed,
    Updated,
    Failed,
    Expired,
}

impl TxState {
    /// Returns `true` if no further transitions can occur.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Updated | Self::Failed | Self::Expired)
    }

    /// Returns `true` for the negative terminal states.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Expired)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Updated => "updated",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for TxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TxState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "updated" => Ok(Self::Updated),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            other => Err(format!("unknown transaction state: {other}")),
        }
    }
}

/// Status snapshot served by `GET /tx/status/{hash}` and the `state` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxStatus {
    /// Empty when the gateway nests the status under an event that already
    /// names the transaction.
    #[serde(default)]
    pub tx_hash: String,
    #[serde(default)]
    pub tx_type: String,
    pub state: TxState,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl TxStatus {
    /// A fresh `pending` status with no history.
    pub fn pending(tx_hash: impl Into<String>, tx_type: impl Into<String>) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            tx_type: tx_type.into(),
            state: TxState::Pending,
            retry_count: 0,
            confirmed_at: None,
            last_error: None,
        }
    }

    /// Chain-confirmed, but the backend reported an error while applying
    /// derived updates.
    pub fn is_stalled(&self) -> bool {
        self.state == TxState::Confirmed
            && self
                .last_error
                .as_deref()
                .is_some_and(|e| !e.trim().is_empty())
    }

    /// Terminal state, or stalled.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal() || self.is_stalled()
    }
}

/// Response of a build endpoint.
///
/// The gateway names the unsigned payload either `unsigned_tx` or
/// `unsignedTxCBOR`; both land in [`BuildResponse::unsigned_tx`]. All other
/// fields (created entity ids and the like) are kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Map<String, Value>")]
pub struct BuildResponse {
    pub unsigned_tx: String,
    pub extra: Map<String, Value>,
}

impl BuildResponse {
    const KEYS: [&'static str; 2] = ["unsigned_tx", "unsignedTxCBOR"];
}

impl TryFrom<Map<String, Value>> for BuildResponse {
    type Error = String;

    fn try_from(mut map: Map<String, Value>) -> Result<Self, Self::Error> {
        let mut unsigned = None;
        for key in Self::KEYS {
            match map.remove(key) {
                Some(Value::String(s)) if unsigned.is_none() && !s.is_empty() => {
                    unsigned = Some(s)
                }
                _ => {}
            }
        }
        let unsigned_tx = unsigned.ok_or_else(|| {
            "response contains neither `unsigned_tx` nor `unsignedTxCBOR`".to_string()
        })?;
        Ok(Self {
            unsigned_tx,
            extra: map,
        })
    }
}

/// Body of `POST /tx/register`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub tx_hash: String,
    pub tx_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TxMetadata>,
}
