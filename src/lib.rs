//! # minibank
//!
//! A partitioned account ledger with:
//! - Accounts spread over partitions by `account mod partitions`
//! - Several replicas per partition, each holding the accounts created on it
//! - Two-phase commit for transfers, account creation and deletion
//! - Read forwarding with replica failover
//! - Exact two-decimal amounts
//! - Per-worker balance snapshots and a shared audit log
//!
//! ## Architecture
//!
//! ```text
//!                  clients (line protocol)
//!                          │
//!               ┌──────────▼──────────┐
//!               │     Coordinator     │
//!               │  routing, 2PC, sums │
//!               └──────────┬──────────┘
//!             ┌────────────┼─────────────┐
//!             │            │             │
//!       ┌─────▼─────┐ ┌────▼──────┐ ┌────▼──────┐
//!       │ Worker    │ │ Worker    │ │ Worker    │
//!       │ p0 / r0   │ │ p0 / r1   │ │ p1 / r0   │
//!       │ + snapshot│ │ + snapshot│ │ + snapshot│
//!       └───────────┘ └───────────┘ └───────────┘
//! ```
//!
//! ## Usage
//!
//! ### Seed snapshots
//! ```bash
//! minibank seed --directory config/cluster.json --out ./data --accounts 10000
//! ```
//!
//! ### Start workers
//! ```bash
//! minibank-worker --bind 127.0.0.1:7001 --snapshot ./data/p0_r0.snap --audit-dir ./data
//! ```
//!
//! ### Start the coordinator
//! ```bash
//! minibank-coord --bind 0.0.0.0:6000 --directory config/cluster.json --audit-dir ./data
//! ```
//!
//! ### Use the CLI
//! ```bash
//! minibank balance 1007
//! minibank transfer 1007 1008 25.50
//! minibank reconcile
//! minibank load --clients 50 --ops 20
//! ```

pub mod common;
pub mod coordinator;
pub mod ops;
pub mod worker;

// Re-export commonly used types
pub use common::{Amount, Error, Record, Result};
pub use coordinator::Coordinator;
pub use worker::WorkerServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build info
pub const BUILD_INFO: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("CARGO_PKG_NAME"), ")");
