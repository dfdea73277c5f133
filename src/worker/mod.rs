//! Worker: one replica of one partition
//!
//! Holds a ledger of the accounts created on this replica and takes part in
//! two-phase commits driven by the coordinator:
//! - PREPARE validates and stages without touching balances
//! - COMMIT applies the staged ops, appends audit rows, rewrites the snapshot
//! - ABORT drops the staged ops
//!
//! Balance queries and partition sums never wait for a transaction.

pub mod ledger;
pub mod server;
pub mod service;
pub mod snapshot;

pub use ledger::{Ledger, Op};
pub use server::WorkerServer;
pub use service::WorkerService;
pub use snapshot::{Balances, FileSnapshot, SnapshotStore};
