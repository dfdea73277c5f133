//! Generate starting snapshots for a cluster

use crate::common::audit::{AccountHolder, HOLDERS_FILE};
use crate::common::{AccountId, Amount, Error, FileAuditStore, Result};
use crate::coordinator::directory::PartitionDirectory;
use crate::worker::snapshot::{write_balances, Balances};
use rand::Rng;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct SeedOptions {
    pub accounts: usize,
    pub start_id: AccountId,
    /// Balances are drawn uniformly from `min_balance..=max_balance`
    pub min_balance: Amount,
    pub max_balance: Amount,
}

impl Default for SeedOptions {
    fn default() -> Self {
        Self {
            accounts: 10_000,
            start_id: 1000,
            min_balance: Amount::from_cents(5_000),
            max_balance: Amount::from_cents(500_000),
        }
    }
}

#[derive(Debug)]
pub struct SeedReport {
    pub accounts: usize,
    pub snapshots: Vec<PathBuf>,
    pub total_balance: Amount,
}

/// Snapshot file for replica `replica` (list position) of `partition`.
pub fn snapshot_file(out: &Path, partition: usize, replica: usize) -> PathBuf {
    out.join(format!("p{}_r{}.snap", partition, replica))
}

/// Write one snapshot per replica so that every replica of a partition
/// starts with that partition's accounts, plus a holders file assigning one
/// client per account.
pub fn seed_cluster(directory: &PartitionDirectory, out: &Path, opts: &SeedOptions) -> Result<SeedReport> {
    if opts.min_balance > opts.max_balance || opts.min_balance.is_negative() {
        return Err(Error::Validation(format!(
            "bad balance range {}..{}",
            opts.min_balance, opts.max_balance
        )));
    }
    fs::create_dir_all(out)?;

    let mut rng = rand::thread_rng();
    let mut partitions = vec![Balances::new(); directory.partition_count()];
    let mut holders = Vec::with_capacity(opts.accounts);
    for i in 0..opts.accounts {
        let account = opts.start_id + i as AccountId;
        let cents = rng.gen_range(opts.min_balance.cents()..=opts.max_balance.cents());
        partitions[directory.route_account(account)].insert(account, Amount::from_cents(cents));
        holders.push(AccountHolder {
            account,
            client: i as u64 + 1,
        });
    }

    let mut report = SeedReport {
        accounts: opts.accounts,
        snapshots: Vec::new(),
        total_balance: Amount::ZERO,
    };
    for (partition, balances) in partitions.iter().enumerate() {
        let replicas = directory.endpoints(partition);
        if replicas.is_empty() {
            tracing::warn!(
                "Partition {} has no replicas; its {} accounts are not written",
                partition,
                balances.len()
            );
            continue;
        }
        let partition_total = Amount::checked_sum(balances.values())?;
        report.total_balance = report.total_balance.checked_add(partition_total)?;
        for replica in 0..replicas.len() {
            let path = snapshot_file(out, partition, replica);
            write_balances(File::create(&path)?, balances)?;
            tracing::info!("Wrote {} accounts to {}", balances.len(), path.display());
            report.snapshots.push(path);
        }
    }

    FileAuditStore::open(out)?.append_rows(HOLDERS_FILE, &holders)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AuditStore;
    use crate::coordinator::directory::ReplicaEndpoint;
    use crate::worker::snapshot::{FileSnapshot, SnapshotStore};

    #[test]
    fn test_every_replica_gets_its_partition() {
        let dir = tempfile::TempDir::new().unwrap();
        let directory = PartitionDirectory::new(vec![
            vec![
                ReplicaEndpoint::new(1, "127.0.0.1", 7001),
                ReplicaEndpoint::new(2, "127.0.0.1", 7002),
            ],
            vec![ReplicaEndpoint::new(3, "127.0.0.1", 7003)],
        ])
        .unwrap();
        let opts = SeedOptions {
            accounts: 10,
            start_id: 100,
            ..Default::default()
        };
        let report = seed_cluster(&directory, dir.path(), &opts).unwrap();
        assert_eq!(report.snapshots.len(), 3);

        let r0 = FileSnapshot::open(snapshot_file(dir.path(), 0, 0)).unwrap().load().unwrap();
        let r1 = FileSnapshot::open(snapshot_file(dir.path(), 0, 1)).unwrap().load().unwrap();
        let p1 = FileSnapshot::open(snapshot_file(dir.path(), 1, 0)).unwrap().load().unwrap();
        assert_eq!(r0, r1);
        assert_eq!(r0.len(), 5);
        assert!(r0.keys().all(|a| a % 2 == 0));
        assert!(p1.keys().all(|a| a % 2 == 1));
        assert!(r0
            .values()
            .chain(p1.values())
            .all(|b| *b >= opts.min_balance && *b <= opts.max_balance));

        let total = Amount::checked_sum(r0.values().chain(p1.values())).unwrap();
        assert_eq!(total, report.total_balance);

        let audit = FileAuditStore::open(dir.path()).unwrap();
        assert_eq!(audit.loans(100).unwrap(), Some(vec![]));
    }

    #[test]
    fn test_bad_range_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let directory =
            PartitionDirectory::new(vec![vec![ReplicaEndpoint::new(1, "h", 1)]]).unwrap();
        let opts = SeedOptions {
            min_balance: Amount::from_cents(10),
            max_balance: Amount::from_cents(5),
            ..Default::default()
        };
        assert!(seed_cluster(&directory, dir.path(), &opts).is_err());
    }
}
