//! Audit log and loan records
//!
//! Workers append one record per applied ledger operation; the coordinator
//! reads the history back per account. Loan records are keyed by the client
//! that holds an account, so a loan lookup first resolves the account holder.
//!
//! The file-backed store keeps JSON lines in one directory that several
//! processes may share:
//!
//! - `transactions.jsonl`: [`TransactionRecord`], appended
//! - `holders.jsonl`: [`AccountHolder`]
//! - `loans.jsonl`: [`LoanRecord`]

use crate::common::{AccountId, Amount, Error, Record, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

pub const TRANSACTIONS_FILE: &str = "transactions.jsonl";
pub const HOLDERS_FILE: &str = "holders.jsonl";
pub const LOANS_FILE: &str = "loans.jsonl";

/// Kind of ledger operation recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpKind {
    Debit,
    Credit,
    Create,
    Delete,
}

impl OpKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Debit => "Debit",
            OpKind::Credit => "Credit",
            OpKind::Create => "Create",
            OpKind::Delete => "Delete",
        }
    }
}

/// One applied operation. Debits carry a negative amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub tx_id: String,
    pub account: AccountId,
    pub kind: OpKind,
    pub amount: Amount,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHolder {
    pub account: AccountId,
    pub client: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanRecord {
    pub loan_id: u64,
    pub client: u64,
    pub total: Amount,
    pub outstanding: Amount,
    pub state: String,
    pub requested_at: String,
}

impl TransactionRecord {
    /// Row of a history response.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("tx_id", &self.tx_id)
            .with("kind", self.kind.as_str())
            .with("amount", self.amount)
            .with("at", self.at.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
    }
}

impl LoanRecord {
    /// Row of a loan status response.
    pub fn to_record(&self) -> Record {
        Record::new()
            .with("loan_id", self.loan_id)
            .with("total", self.total)
            .with("outstanding", self.outstanding)
            .with("state", &self.state)
            .with("requested_at", &self.requested_at)
    }
}

/// Durable store queried and appended by account id.
pub trait AuditStore: Send + Sync {
    fn append(&self, record: &TransactionRecord) -> Result<()>;

    /// Newest first, at most `limit` rows.
    fn history(&self, account: AccountId, limit: usize) -> Result<Vec<TransactionRecord>>;

    /// `None` when no client holds `account`.
    fn loans(&self, account: AccountId) -> Result<Option<Vec<LoanRecord>>>;
}

fn newest_first(mut rows: Vec<TransactionRecord>, limit: usize) -> Vec<TransactionRecord> {
    // stable sort keeps append order for equal timestamps; reverse puts the latest append first
    rows.sort_by_key(|r| r.at);
    rows.reverse();
    rows.truncate(limit);
    rows
}

/// In-process store, used by tests and single-process setups
#[derive(Default)]
pub struct MemoryAuditStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    transactions: Vec<TransactionRecord>,
    holders: Vec<AccountHolder>,
    loans: Vec<LoanRecord>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_holder(&self, holder: AccountHolder) {
        self.inner.lock().holders.push(holder);
    }

    pub fn add_loan(&self, loan: LoanRecord) {
        self.inner.lock().loans.push(loan);
    }

    pub fn transactions(&self) -> Vec<TransactionRecord> {
        self.inner.lock().transactions.clone()
    }
}

impl AuditStore for MemoryAuditStore {
    fn append(&self, record: &TransactionRecord) -> Result<()> {
        self.inner.lock().transactions.push(record.clone());
        Ok(())
    }

    fn history(&self, account: AccountId, limit: usize) -> Result<Vec<TransactionRecord>> {
        let rows = self
            .inner
            .lock()
            .transactions
            .iter()
            .filter(|r| r.account == account)
            .cloned()
            .collect();
        Ok(newest_first(rows, limit))
    }

    fn loans(&self, account: AccountId) -> Result<Option<Vec<LoanRecord>>> {
        let inner = self.inner.lock();
        let Some(holder) = inner.holders.iter().find(|h| h.account == account) else {
            return Ok(None);
        };
        let loans = inner
            .loans
            .iter()
            .filter(|l| l.client == holder.client)
            .cloned()
            .collect();
        Ok(Some(loans))
    }
}

/// JSON-lines store in a shared directory
pub struct FileAuditStore {
    dir: PathBuf,
    writer: Mutex<File>,
}

impl FileAuditStore {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        let writer = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(TRANSACTIONS_FILE))?;
        Ok(Self {
            dir,
            writer: Mutex::new(writer),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append rows to one of the reference files (holders, loans).
    pub fn append_rows<T: Serialize>(&self, file: &str, rows: &[T]) -> Result<()> {
        let mut out = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(file))?;
        let mut buf = String::new();
        for row in rows {
            buf.push_str(&serde_json::to_string(row)?);
            buf.push('\n');
        }
        out.write_all(buf.as_bytes())?;
        Ok(())
    }

    fn read_rows<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.dir.join(file);
        let f = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut rows = Vec::new();
        for (n, line) in BufReader::new(f).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(&line) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    tracing::warn!("Skipping {}:{}: {}", path.display(), n + 1, e);
                }
            }
        }
        Ok(rows)
    }
}

impl AuditStore for FileAuditStore {
    fn append(&self, record: &TransactionRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut f = self.writer.lock();
        f.write_all(line.as_bytes())
            .map_err(|e| Error::Audit(format!("append to {}: {}", TRANSACTIONS_FILE, e)))?;
        Ok(())
    }

    fn history(&self, account: AccountId, limit: usize) -> Result<Vec<TransactionRecord>> {
        let rows: Vec<TransactionRecord> = self.read_rows(TRANSACTIONS_FILE)?;
        let rows = rows.into_iter().filter(|r| r.account == account).collect();
        Ok(newest_first(rows, limit))
    }

    fn loans(&self, account: AccountId) -> Result<Option<Vec<LoanRecord>>> {
        let holders: Vec<AccountHolder> = self.read_rows(HOLDERS_FILE)?;
        let Some(holder) = holders.iter().find(|h| h.account == account) else {
            return Ok(None);
        };
        let loans: Vec<LoanRecord> = self.read_rows(LOANS_FILE)?;
        Ok(Some(
            loans
                .into_iter()
                .filter(|l| l.client == holder.client)
                .collect(),
        ))
    }
}
