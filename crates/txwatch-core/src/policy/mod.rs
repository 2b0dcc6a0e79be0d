//! Reliability policies applied to gateway calls.
//!
//! Only idempotent calls go through a policy:
//! ```text
//! fetch_status / register → [RetryPolicy] → HTTP
//! ```

pub mod retry;

pub use retry::{RetryConfig, RetryPolicy};
