//! Coordinator request handling

use crate::common::net::LineService;
use crate::common::wire::kind;
use crate::common::{
    Amount, AuditStore, CoordinatorConfig, Error, OpDescriptor, Record, Result, Status,
};
use crate::coordinator::directory::PartitionDirectory;
use crate::coordinator::twopc::TwoPhaseCommit;
use crate::coordinator::worker_client::WorkerClient;
use futures_util::future::join_all;
use std::sync::Arc;

pub struct CoordinatorService {
    directory: Arc<PartitionDirectory>,
    client: WorkerClient,
    twopc: TwoPhaseCommit,
    audit: Arc<dyn AuditStore>,
    history_limit: usize,
}

impl CoordinatorService {
    pub fn new(
        directory: PartitionDirectory,
        audit: Arc<dyn AuditStore>,
        config: &CoordinatorConfig,
    ) -> Self {
        let directory = Arc::new(directory);
        let client = WorkerClient::from_config(config);
        let twopc = TwoPhaseCommit::new(directory.clone(), client.clone(), config.await_commit_acks);
        Self {
            directory,
            client,
            twopc,
            audit,
            history_limit: config.history_limit,
        }
    }

    pub fn directory(&self) -> &PartitionDirectory {
        &self.directory
    }

    pub async fn handle_line(&self, line: &str) -> String {
        match Record::decode(line) {
            Ok(req) => self.handle(&req).await.encode(),
            Err(e) => {
                tracing::debug!("Rejecting malformed request: {}", e);
                Record::error(e.code()).encode()
            }
        }
    }

    pub async fn handle(&self, req: &Record) -> Record {
        let kind = req.kind().unwrap_or_default();
        tracing::debug!(kind = %kind, "client request");
        let result = match kind.as_str() {
            kind::QUERY_ACCOUNT => self.query(req).await,
            kind::TRANSFER | kind::CREATE_ACCOUNT | kind::DELETE_ACCOUNT => self.write(req).await,
            kind::HISTORY => self.history(req),
            kind::LOAN_STATUS => self.loans(req),
            kind::RECONCILE => self.reconcile().await,
            _ => Err(Error::UnknownRequestType(kind.clone())),
        };
        result.unwrap_or_else(|e| error_response(&e))
    }

    /// Whatever the first reachable replica answers goes back verbatim.
    async fn query(&self, req: &Record) -> Result<Record> {
        let account = req.require_account("account")?;
        let partition = self.directory.route_account(account);
        let forwarded = Record::request(kind::QUERY_ACCOUNT).with("account", account);
        self.client.forward_read(&self.directory, partition, &forwarded).await
    }

    async fn write(&self, req: &Record) -> Result<Record> {
        let desc = OpDescriptor::from_client(req)?;
        let tx_id = self.twopc.execute(&desc).await?;
        tracing::info!(tx_id = %tx_id, "committed {:?}", desc);
        Ok(Record::ok().with("tx_id", tx_id))
    }

    fn history(&self, req: &Record) -> Result<Record> {
        let account = req.require_account("account")?;
        let rows = self.audit.history(account, self.history_limit)?;
        Ok(Record::ok()
            .with("account", account)
            .with_list("data", rows.iter().map(|r| r.to_record()).collect()))
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

    /// Sum of every partition, or an error if any partition cannot answer.
    async fn reconcile(&self) -> Result<Record> {
        let req = Record::request(kind::SUM_PARTITION);
        let sums = (0..self.directory.partition_count()).map(|partition| {
            let req = &req;
            async move {
                let resp = self.client.forward_read(&self.directory, partition, req).await?;
                partition_sum(partition, &resp)
            }
        });
        let mut total = Amount::ZERO;
        for sum in join_all(sums).await {
            total = total.checked_add(sum?)?;
        }
        Ok(Record::ok().with("total_balance", total))
    }
}

fn partition_sum(partition: usize, resp: &Record) -> Result<Amount> {
    if resp.response_status() != Some(Status::Ok) {
        return Err(Error::Internal(format!(
            "partition {} answered {}",
            partition, resp
        )));
    }
    resp.require_amount("sum")
}

/// `ERROR` response for a failed request. Aborted writes carry their tx id.
fn error_response(e: &Error) -> Record {
    let rec = Record::error(e.code());
    match e {
        Error::Aborted { tx_id, .. } => rec.with("tx_id", tx_id),
        _ => rec,
    }
}

impl LineService for CoordinatorService {
    async fn call(&self, line: String) -> String {
        self.handle_line(&line).await
    }
}
