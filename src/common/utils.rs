//! Utility functions for minibank

use uuid::Uuid;

/// Fresh transaction id.
///
/// Random (UUID v4) rather than clock based, so two requests arriving in the
/// same millisecond cannot share an id.
pub fn new_tx_id() -> String {
    format!("tx_{}", Uuid::new_v4().simple())
}

/// Partition owning `account`. Negative ids wrap like positive ones.
pub fn partition_of(account: i64, partitions: usize) -> usize {
    account.rem_euclid(partitions as i64) as usize
}
