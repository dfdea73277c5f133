//! Worker request handling

use crate::common::wire::kind;
use crate::common::{
    AuditStore, Error, ErrorCode, OpDescriptor, Record, Result, Status, TransactionRecord,
};
use crate::worker::ledger::{Ledger, Op};
use crate::worker::snapshot::SnapshotStore;
use chrono::Utc;
use std::sync::Arc;

/// Answers coordinator requests against one ledger.
pub struct WorkerService {
    ledger: Ledger,
    snapshot: Arc<dyn SnapshotStore>,
    audit: Arc<dyn AuditStore>,
}

impl WorkerService {
    /// Build the ledger from the current snapshot.
    pub fn open(snapshot: Arc<dyn SnapshotStore>, audit: Arc<dyn AuditStore>) -> Result<Self> {
        let balances = snapshot.load()?;
        Ok(Self {
            ledger: Ledger::new(balances),
            snapshot,
            audit,
        })
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Decode, dispatch and encode one request line.
    pub fn handle_line(&self, line: &str) -> String {
        match Record::decode(line) {
            Ok(req) => self.handle(&req).encode(),
            Err(e) => {
                tracing::debug!("Rejecting malformed request: {}", e);
                Record::error(e.code()).encode()
            }
        }
    }

    pub fn handle(&self, req: &Record) -> Record {
        let kind = req.kind().unwrap_or_default();
        tracing::debug!(kind = %kind, "worker request");
        let result = match kind.as_str() {
            kind::QUERY_ACCOUNT => self.query(req),
            kind::SUM_PARTITION => self.ledger.sum_all().map(|sum| Record::ok().with("sum", sum)),
            kind::PREPARE_TRANSFER | kind::PREPARE_CREATE | kind::PREPARE_DELETE => {
                return self.prepare(req);
            }
            kind::COMMIT => self.commit(req),
            kind::ABORT => self.abort(req),
            kind::LOAN_STATUS => self.loans(req),
            _ => Err(Error::UnknownRequestType(kind.clone())),
        };
        result.unwrap_or_else(|e| Record::error(e.code()))
    }

    fn query(&self, req: &Record) -> Result<Record> {
        let account = req.require_account("account")?;
        let balance = self.ledger.query(account)?;
        Ok(Record::ok().with("account", account).with("balance", balance))
    }

    /// Any failure while validating is a rejection carrying the tx id.
    fn prepare(&self, req: &Record) -> Record {
        let tx_id = match req.require("tx_id") {
            Ok(tx_id) => tx_id,
            Err(e) => return Record::error(e.code()),
        };
        let staged = OpDescriptor::from_prepare(req)
            .and_then(|desc| self.ledger.lock().prepare(tx_id, &desc).map(|ops| ops.len()));
        match staged {
            Ok(n) => {
                tracing::debug!(tx_id, ops = n, "prepared");
                Record::status(Status::Ready).with("tx_id", tx_id)
            }
            Err(e) => {
                tracing::info!(tx_id, "prepare rejected: {}", e);
                Record::error(ErrorCode::ValidationFailed).with("tx_id", tx_id)
            }
        }
    }

    fn commit(&self, req: &Record) -> Result<Record> {
        let tx_id = req.require("tx_id")?;
        let mut txn = self.ledger.lock();
        let ops = txn
            .take(tx_id)
            .ok_or_else(|| Error::NotFound(format!("transaction {}", tx_id)))?;

        let at = Utc::now();
        for op in &ops {
            if let Err(e) = txn.apply(op) {
                tracing::warn!(tx_id, "skipping {:?}: {}", op, e);
                continue;
            }
            self.record(tx_id, op, at);
        }

        if let Err(e) = self.snapshot.save(&txn.balances()) {
            tracing::error!(tx_id, "snapshot write failed after commit: {}", e);
            return Err(e);
        }
        tracing::debug!(tx_id, ops = ops.len(), "committed");
        Ok(Record::status(Status::Committed).with("tx_id", tx_id))
    }

    fn record(&self, tx_id: &str, op: &Op, at: chrono::DateTime<Utc>) {
        let row = TransactionRecord {
            tx_id: tx_id.to_string(),
            account: op.account(),
            kind: op.kind(),
            amount: op.signed_amount(),
            at,
        };
        if let Err(e) = self.audit.append(&row) {
            tracing::warn!(tx_id, "audit append failed: {}", e);
        }
    }

    fn abort(&self, req: &Record) -> Result<Record> {
        let tx_id = req.require("tx_id")?;
        if self.ledger.lock().discard(tx_id) {
            tracing::debug!(tx_id, "aborted");
        }
        Ok(Record::status(Status::Aborted).with("tx_id", tx_id))
    }

    fn loans(&self, req: &Record) -> Result<Record> {
        let account = req.require_account("account")?;
        let loans = self
            .audit
            .loans(account)?
            .ok_or_else(|| Error::NotFound(format!("holder of account {}", account)))?;
        Ok(Record::ok()
            .with("account", account)
            .with_list("data", loans.iter().map(|l| l.to_record()).collect()))
    }
}
