//! Two-phase commit across the replicas of every touched partition
//!
//! ```text
//! ROUTING ──> PREPARING ──all READY──> COMMITTING ──> done (OK)
//!                 │
//!                 └──any rejection or silence──> ABORTING ──> done (ERROR)
//! ```
//!
//! Nothing is persisted on the coordinator. If it dies between PREPARE and
//! COMMIT the workers keep the staged entries until an ABORT for that tx id
//! arrives.

use crate::common::{new_tx_id, Error, ErrorCode, OpDescriptor, Record, Result, Status};
use crate::common::wire::kind;
use crate::coordinator::directory::{PartitionDirectory, ReplicaEndpoint};
use crate::coordinator::worker_client::WorkerClient;
use std::sync::Arc;

/// A participant's answer to PREPARE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Ready,
    Rejected,
    Unreachable,
}

impl Vote {
    pub fn from_response(response: &Result<Record>) -> Self {
        match response {
            Ok(rec) if rec.response_status() == Some(Status::Ready) => Vote::Ready,
            Ok(_) => Vote::Rejected,
            Err(_) => Vote::Unreachable,
        }
    }
}

/// Why a transaction aborted, given every vote.
fn abort_reason(votes: &[(ReplicaEndpoint, Vote)]) -> Option<ErrorCode> {
    if votes.iter().any(|(_, v)| *v == Vote::Rejected) {
        Some(ErrorCode::ValidationFailed)
    } else if votes.iter().any(|(_, v)| *v == Vote::Unreachable) {
        Some(ErrorCode::NodeUnreachable)
    } else {
        None
    }
}

pub struct TwoPhaseCommit {
    directory: Arc<PartitionDirectory>,
    client: WorkerClient,
    await_commit_acks: bool,
}

impl TwoPhaseCommit {
    pub fn new(directory: Arc<PartitionDirectory>, client: WorkerClient, await_commit_acks: bool) -> Self {
        Self {
            directory,
            client,
            await_commit_acks,
        }
    }

    /// Run one write to completion. Returns the tx id on success; an abort
    /// comes back as [`Error::Aborted`] carrying the tx id and reason.
    pub async fn execute(&self, desc: &OpDescriptor) -> Result<String> {
        let tx_id = new_tx_id();
        desc.validate().map_err(|e| {
            tracing::info!(tx_id = %tx_id, "rejected before prepare: {}", e);
            Error::Aborted {
                tx_id: tx_id.clone(),
                reason: e.code(),
            }
        })?;

        let participants = self.directory.participants_for(&desc.accounts())?;
        tracing::debug!(tx_id = %tx_id, participants = participants.len(), "preparing");

        let prepare = desc.to_prepare(&tx_id);
        let votes: Vec<(ReplicaEndpoint, Vote)> = self
            .client
            .broadcast(&participants, &prepare)
            .await
            .into_iter()
            .map(|(ep, response)| {
                let vote = Vote::from_response(&response);
                if let Err(e) = &response {
                    tracing::warn!(tx_id = %tx_id, "{} did not answer PREPARE: {}", ep, e);
                }
                (ep, vote)
            })
            .collect();

        if let Some(reason) = abort_reason(&votes) {
            self.abort(&tx_id, &votes).await;
            tracing::info!(tx_id = %tx_id, %reason, "aborted");
            return Err(Error::Aborted { tx_id, reason });
        }

        self.commit(&tx_id, participants).await;
        Ok(tx_id)
    }

    /// ABORT to the participants that staged something.
    async fn abort(&self, tx_id: &str, votes: &[(ReplicaEndpoint, Vote)]) {
        let ready: Vec<ReplicaEndpoint> = votes
            .iter()
            .filter(|(_, v)| *v == Vote::Ready)
            .map(|(ep, _)| ep.clone())
            .collect();
        if ready.is_empty() {
            return;
        }
        let req = Record::request(kind::ABORT).with("tx_id", tx_id);
        for (ep, result) in self.client.broadcast(&ready, &req).await {
            if let Err(e) = result {
                tracing::warn!(tx_id = %tx_id, "ABORT to {} failed: {}", ep, e);
            }
        }
    }

    /// COMMIT to every participant on a detached task, so the commit goes out
    /// even if the client connection is dropped meanwhile.
    async fn commit(&self, tx_id: &str, participants: Vec<ReplicaEndpoint>) {
        let client = self.client.clone();
        let req = Record::request(kind::COMMIT).with("tx_id", tx_id);
        let tx_id = tx_id.to_string();
        let dispatch = tokio::spawn(async move {
            for (ep, result) in client.broadcast(&participants, &req).await {
                match result {
                    Ok(resp) if resp.response_status() == Some(Status::Committed) => {}
                    Ok(resp) => tracing::warn!(tx_id = %tx_id, "COMMIT to {} answered {}", ep, resp),
                    Err(e) => tracing::warn!(tx_id = %tx_id, "COMMIT to {} failed: {}", ep, e),
                }
            }
            tracing::debug!(tx_id = %tx_id, "commit fan-out finished");
        });
        if self.await_commit_acks {
            if let Err(e) = dispatch.await {
                tracing::warn!("commit fan-out task failed: {}", e);
            }
        }
    }
}
