//! txwatch-executor — runs a transaction from parameters to a watched hash.
//!
//! ```text
//! params ─► validate ─► build (gateway) ─► sign (wallet) ─► submit (wallet)
//!                                                              │
//!                         register (gateway, best effort) ◄────┘
//!                                    │
//!                                    ▼
//!                          WatchRegistry::watch(hash)
//! ```

pub mod error;
pub mod executor;
pub mod validation;
pub mod wallet;

pub use error::ExecuteError;
pub use executor::{
    ErrorCallback, ExecuteOptions, ExecutionState, ExecutorConfig, SuccessCallback, TxExecutor,
    TxResult,
};
pub use validation::{FieldRule, FieldType, FieldViolation, ParamSchema, SchemaRegistry};
pub use wallet::{WalletError, WalletSigner};
