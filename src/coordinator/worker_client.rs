//! Coordinator → worker calls

use crate::common::net::request_line;
use crate::common::{CoordinatorConfig, Error, Record, Result};
use crate::coordinator::directory::{PartitionDirectory, ReplicaEndpoint};
use futures_util::future::join_all;
use std::time::Duration;

/// Talks to workers over short-lived connections, one request per connection,
/// with fixed connect and read timeouts.
#[derive(Debug, Clone)]
pub struct WorkerClient {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl WorkerClient {
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &CoordinatorConfig) -> Self {
        Self::new(config.connect_timeout(), config.read_timeout())
    }

    /// Send `req` to one replica. A response that does not decode counts as
    /// no response.
    pub async fn call(&self, endpoint: &ReplicaEndpoint, req: &Record) -> Result<Record> {
        let addr = endpoint.addr();
        let line = request_line(&addr, &req.encode(), self.connect_timeout, self.read_timeout).await?;
        Record::decode(&line).map_err(|e| Error::NodeUnreachable {
            node: addr,
            reason: format!("malformed response: {}", e),
        })
    }

    /// Try the replicas of `partition` in order and return the first
    /// response, whatever its status.
    pub async fn forward_read(
        &self,
        directory: &PartitionDirectory,
        partition: usize,
        req: &Record,
    ) -> Result<Record> {
        for endpoint in directory.require_endpoints(partition)? {
            match self.call(endpoint, req).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::warn!(partition, "{} skipped: {}", endpoint, e);
                }
            }
        }
        Err(Error::PartitionUnreachable(partition))
    }

    /// Send `req` to every endpoint concurrently. Results come back in the
    /// order of `endpoints`.
    pub async fn broadcast(
        &self,
        endpoints: &[ReplicaEndpoint],
        req: &Record,
    ) -> Vec<(ReplicaEndpoint, Result<Record>)> {
        let calls = endpoints.iter().map(|endpoint| async move {
            (endpoint.clone(), self.call(endpoint, req).await)
        });
        join_all(calls).await
    }
}
