//! txwatch-http — the transaction gateway over HTTP.
//!
//! # Features
//! - Build / register / status calls as JSON over HTTP
//! - `text/event-stream` status stream exposed as a byte stream
//! - Retry with exponential backoff for idempotent calls
//! - Optional bearer authentication

pub mod client;
pub mod config;

pub use client::HttpGateway;
pub use config::GatewayConfig;
