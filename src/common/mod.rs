//! Common utilities and types shared across minibank

pub mod amount;
pub mod audit;
pub mod config;
pub mod error;
pub mod net;
pub mod txn;
pub mod utils;
pub mod wire;

/// Account identifier as carried on the wire.
pub type AccountId = i64;

pub use amount::Amount;
pub use audit::{AuditStore, FileAuditStore, MemoryAuditStore, OpKind, TransactionRecord};
pub use config::{CoordinatorConfig, DirectoryFile, Settings, WorkerConfig};
pub use error::{Error, ErrorCode, Result};
pub use txn::OpDescriptor;
pub use utils::{new_tx_id, partition_of};
pub use wire::{Record, Status};
