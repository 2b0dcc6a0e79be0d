//! txwatch-core — foundation types for transaction confirmation tracking.
//!
//! # Overview
//!
//! txwatch follows a submitted transaction from broadcast until the backend
//! reports it as chain-confirmed *and* its derived database updates applied.
//! The core crate defines:
//!
//! - [`TxState`] / [`TxStatus`] — the backend's status record
//! - [`TxKind`] — the closed set of transaction kinds and their static table
//! - [`codec`] — the `text/event-stream` frame decoder and typed stream events
//! - [`TxGateway`] — the async trait every backend client implements
//! - [`GatewayError`] — structured error type
//! - [`policy`] module — retry with exponential backoff

pub mod codec;
pub mod error;
pub mod gateway;
pub mod kind;
pub mod policy;
pub mod types;

pub use codec::{SseDecoder, SseFrame, TxStreamEvent};
pub use error::GatewayError;
pub use gateway::{ByteStream, TxGateway};
pub use kind::{KindConfig, TxKind};
pub use types::{BuildResponse, RegisterRequest, TxMetadata, TxState, TxStatus};
