//! Partition directory: which replicas serve which partition
//!
//! Accounts are assigned to partitions by `account mod partitions`. Each
//! partition has an ordered replica list; the order is the failover order for
//! reads. The directory is built once at startup and never changes.

use crate::common::config::DirectoryFile;
use crate::common::{partition_of, AccountId, Error, Result};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplicaEndpoint {
    pub id: u32,
    pub host: String,
    pub port: u16,
}

impl ReplicaEndpoint {
    pub fn new(id: u32, host: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            host: host.into(),
            port,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ReplicaEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "replica {} ({}:{})", self.id, self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub struct PartitionDirectory {
    partitions: Vec<Vec<ReplicaEndpoint>>,
}

impl PartitionDirectory {
    /// Build from replica lists indexed by partition.
    pub fn new(partitions: Vec<Vec<ReplicaEndpoint>>) -> Result<Self> {
        if partitions.is_empty() {
            return Err(Error::InvalidConfig("partitions must be at least 1".into()));
        }
        Ok(Self { partitions })
    }

    pub fn from_file(file: &DirectoryFile) -> Result<Self> {
        let lists = file
            .partition_lists()?
            .into_iter()
            .map(|list| {
                list.into_iter()
                    .map(|ep| ReplicaEndpoint::new(ep.id, ep.host, ep.port))
                    .collect()
            })
            .collect();
        Self::new(lists)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let directory = Self::from_file(&DirectoryFile::load(path)?)?;
        tracing::info!(
            "Loaded partition directory {} ({} partitions)",
            path.display(),
            directory.partition_count()
        );
        Ok(directory)
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn route_account(&self, account: AccountId) -> usize {
        partition_of(account, self.partitions.len())
    }

    /// Replicas of `partition` in failover order; empty if not configured.
    pub fn endpoints(&self, partition: usize) -> &[ReplicaEndpoint] {
        self.partitions
            .get(partition)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Replicas of `partition`, failing if there are none.
    pub fn require_endpoints(&self, partition: usize) -> Result<&[ReplicaEndpoint]> {
        let endpoints = self.endpoints(partition);
        if endpoints.is_empty() {
            return Err(Error::PartitionNotConfigured(partition));
        }
        Ok(endpoints)
    }

    /// Every replica of every partition touched by `accounts`, each once.
    /// Fails if any touched partition has no replicas.
    pub fn participants_for(&self, accounts: &[AccountId]) -> Result<Vec<ReplicaEndpoint>> {
        let partitions: BTreeSet<usize> = accounts.iter().map(|&a| self.route_account(a)).collect();
        let mut seen = BTreeSet::new();
        let mut participants = Vec::new();
        for partition in partitions {
            for ep in self.require_endpoints(partition)? {
                if seen.insert(ep.clone()) {
                    participants.push(ep.clone());
                }
            }
        }
        Ok(participants)
    }
}
