//! Balance snapshot persistence
//!
//! The snapshot is the worker's only durable state: one `account_id,balance`
//! line per account, rewritten in full after every commit. Writes go to a
//! sibling temp file that is renamed over the snapshot, so a crash mid-write
//! leaves the previous snapshot intact.

use crate::common::{AccountId, Amount, Error, Result};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

pub type Balances = BTreeMap<AccountId, Amount>;

/// Where a worker keeps its balances between restarts.
pub trait SnapshotStore: Send + Sync {
    fn load(&self) -> Result<Balances>;

    fn save(&self, balances: &Balances) -> Result<()>;
}

/// Snapshot kept as a text file.
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    /// Open the snapshot at `path`, creating an empty file (and its parent
    /// directory) when missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        if !path.exists() {
            File::create(&path)?;
            tracing::info!("Created empty snapshot {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

/// Parse one snapshot line.
pub fn parse_line(line: &str) -> Result<(AccountId, Amount)> {
    let (id, balance) = line
        .split_once(',')
        .ok_or_else(|| Error::SnapshotCorrupted(format!("no separator in {:?}", line)))?;
    let id = id
        .trim()
        .parse()
        .map_err(|_| Error::SnapshotCorrupted(format!("bad account id in {:?}", line)))?;
    let balance = balance
        .trim()
        .parse()
        .map_err(|_| Error::SnapshotCorrupted(format!("bad balance in {:?}", line)))?;
    Ok((id, balance))
}

/// Write `balances` in snapshot format.
pub fn write_balances<W: Write>(out: W, balances: &Balances) -> Result<()> {
    let mut out = BufWriter::new(out);
    for (id, balance) in balances {
        writeln!(out, "{},{}", id, balance)?;
    }
    out.flush()?;
    Ok(())
}

impl SnapshotStore for FileSnapshot {
    fn load(&self) -> Result<Balances> {
        let file = File::open(&self.path)?;
        let mut balances = Balances::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok((id, balance)) => {
                    balances.insert(id, balance);
                }
                Err(e) => tracing::warn!("{}:{}: skipping line: {}", self.path.display(), n + 1, e),
            }
        }
        tracing::info!(
            "Loaded {} accounts from {}",
            balances.len(),
            self.path.display()
        );
        Ok(balances)
    }

    fn save(&self, balances: &Balances) -> Result<()> {
        let tmp = self.temp_path();
        let file = File::create(&tmp)?;
        write_balances(&file, balances)?;
        file.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
