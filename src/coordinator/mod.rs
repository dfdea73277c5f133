//! Coordinator: client entry point
//!
//! The coordinator is responsible for:
//! - Routing (account → partition → replicas)
//! - Read forwarding with replica failover
//! - Write orchestration (2PC with workers)
//! - Reconciliation across partitions
//! - History and loan queries against the audit store
//!
//! It keeps no state between requests.

pub mod directory;
pub mod server;
pub mod service;
pub mod twopc;
pub mod worker_client;

pub use directory::{PartitionDirectory, ReplicaEndpoint};
pub use server::Coordinator;
pub use service::CoordinatorService;
pub use twopc::TwoPhaseCommit;
pub use worker_client::WorkerClient;
