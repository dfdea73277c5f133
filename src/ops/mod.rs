//! Client-side tooling: coordinator client, cluster seeding, load generation

pub mod client;
pub mod load;
pub mod seed;

pub use client::LedgerClient;
pub use load::{run_load, LoadOptions, LoadReport};
pub use seed::{seed_cluster, snapshot_file, SeedOptions, SeedReport};
