//! Worker server

use crate::common::net::{self, LineService};
use crate::common::{ErrorCode, FileAuditStore, Record, Result, WorkerConfig};
use crate::worker::service::WorkerService;
use crate::worker::snapshot::FileSnapshot;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct WorkerServer {
    listener: TcpListener,
    service: Arc<WorkerService>,
}

/// Ledger work takes blocking locks and writes files, so it runs on the
/// blocking pool rather than on the connection task.
struct Blocking(Arc<WorkerService>);

impl LineService for Blocking {
    async fn call(&self, line: String) -> String {
        let service = Arc::clone(&self.0);
        match tokio::task::spawn_blocking(move || service.handle_line(&line)).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Request handler failed: {}", e);
                Record::error(ErrorCode::InternalOperationFailure).encode()
            }
        }
    }
}

impl WorkerServer {
    pub fn new(listener: TcpListener, service: Arc<WorkerService>) -> Self {
        Self { listener, service }
    }

    /// Open the snapshot and audit store named in `config` and bind.
    pub async fn bind(config: &WorkerConfig) -> Result<Self> {
        tracing::info!("Starting worker");
        tracing::info!("  Snapshot: {}", config.snapshot_path.display());
        tracing::info!("  Audit dir: {}", config.audit_dir.display());

        let snapshot = Arc::new(FileSnapshot::open(&config.snapshot_path)?);
        let audit = Arc::new(FileAuditStore::open(&config.audit_dir)?);
        let service = Arc::new(WorkerService::open(snapshot, audit)?);

        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!("  Listening on {}", listener.local_addr()?);
        Ok(Self::new(listener, service))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn service(&self) -> &Arc<WorkerService> {
        &self.service
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(
            accounts = self.service.ledger().len(),
            "✓ Worker ready"
        );
        net::serve(self.listener, Arc::new(Blocking(self.service)), shutdown).await
    }

    pub async fn run_until_ctrl_c(self) -> Result<()> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to install Ctrl-C handler: {}", e);
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_worker_over_tcp() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = WorkerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            snapshot_path: dir.path().join("w.snap"),
            audit_dir: dir.path().join("audit"),
        };
        let server = WorkerServer::bind(&config).await.unwrap();
        let addr = server.local_addr().unwrap().to_string();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        let call = |line: &'static str| {
            let addr = addr.clone();
            async move {
                net::request_line(&addr, line, Duration::from_secs(1), Duration::from_secs(5))
                    .await
                    .unwrap()
            }
        };
        assert_eq!(
            call(r#"{"type":"PREPARE_CREATE","tx_id":"tx_1","account":7,"initial":100}"#).await,
            r#"{"status":"READY","tx_id":"tx_1"}"#
        );
        assert_eq!(
            call(r#"{"type":"COMMIT","tx_id":"tx_1"}"#).await,
            r#"{"status":"COMMITTED","tx_id":"tx_1"}"#
        );
        assert_eq!(
            call(r#"{"type":"CONSULTAR_CUENTA","account":7}"#).await,
            r#"{"status":"OK","account":7,"balance":100.00}"#
        );

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("w.snap")).unwrap(),
            "7,100.00\n"
        );
    }
}
