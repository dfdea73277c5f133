//! Test cluster harness: real workers and a coordinator on ephemeral ports

#![allow(dead_code)]

use minibank::common::{CoordinatorConfig, FileAuditStore, Record, WorkerConfig};
use minibank::coordinator::{Coordinator, CoordinatorService, PartitionDirectory, ReplicaEndpoint};
use minibank::ops::LedgerClient;
use minibank::worker::{WorkerServer, WorkerService};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub struct TestWorker {
    pub addr: SocketAddr,
    pub service: Arc<WorkerService>,
    pub snapshot: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<minibank::Result<()>>>,
}

impl TestWorker {
    pub fn endpoint(&self, id: u32) -> ReplicaEndpoint {
        ReplicaEndpoint::new(id, "127.0.0.1", self.addr.port())
    }

    /// Stop accepting connections and wait for the listener to close.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle.await.unwrap().unwrap();
        }
    }
}

/// Start a worker whose snapshot initially holds `accounts` (`id,balance` pairs).
pub async fn spawn_worker(dir: &Path, name: &str, accounts: &[(i64, &str)]) -> TestWorker {
    let snapshot = dir.join(format!("{}.snap", name));
    if !snapshot.exists() {
        let body: String = accounts
            .iter()
            .map(|(id, balance)| format!("{},{}\n", id, balance))
            .collect();
        std::fs::write(&snapshot, body).unwrap();
    }
    start_worker(dir, snapshot).await
}

/// Start a worker on an existing snapshot file.
pub async fn start_worker(dir: &Path, snapshot: PathBuf) -> TestWorker {
    let config = WorkerConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        snapshot_path: snapshot.clone(),
        audit_dir: dir.join("audit"),
    };
    let server = WorkerServer::bind(&config).await.unwrap();
    let addr = server.local_addr().unwrap();
    let service = server.service().clone();
    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(server.run_until(async {
        let _ = rx.await;
    }));
    TestWorker {
        addr,
        service,
        snapshot,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// An endpoint nothing listens on.
pub async fn dead_endpoint(id: u32) -> ReplicaEndpoint {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    ReplicaEndpoint::new(id, "127.0.0.1", port)
}

pub fn test_config() -> CoordinatorConfig {
    CoordinatorConfig {
        connect_timeout_ms: 500,
        read_timeout_ms: 2000,
        await_commit_acks: true,
        ..Default::default()
    }
}

/// Start a coordinator over `partitions` and return its address.
pub async fn spawn_coordinator(dir: &Path, partitions: Vec<Vec<ReplicaEndpoint>>) -> SocketAddr {
    spawn_coordinator_with(dir, partitions, &test_config()).await
}

pub async fn spawn_coordinator_with(
    dir: &Path,
    partitions: Vec<Vec<ReplicaEndpoint>>,
    config: &CoordinatorConfig,
) -> SocketAddr {
    let directory = PartitionDirectory::new(partitions).unwrap();
    let audit = Arc::new(FileAuditStore::open(dir.join("audit")).unwrap());
    let service = CoordinatorService::new(directory, audit, config);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(Coordinator::new(listener, service).run_until(std::future::pending()));
    addr
}

pub async fn client(addr: SocketAddr) -> LedgerClient {
    LedgerClient::connect(&addr.to_string(), Duration::from_secs(5))
        .await
        .unwrap()
}

/// Balance held by one worker, or `None` if it does not hold the account.
pub fn balance_on(worker: &TestWorker, account: i64) -> Option<String> {
    worker
        .service
        .ledger()
        .query(account)
        .ok()
        .map(|b| b.to_string())
}

/// Poll until `check` holds, failing after two seconds.
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

pub fn status_of(resp: &Record) -> &str {
    resp.get("status").unwrap_or("")
}
