//! Coordinator server

use crate::common::net;
use crate::common::{CoordinatorConfig, FileAuditStore, Result};
use crate::coordinator::directory::PartitionDirectory;
use crate::coordinator::service::CoordinatorService;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct Coordinator {
    listener: TcpListener,
    service: Arc<CoordinatorService>,
}

impl Coordinator {
    pub fn new(listener: TcpListener, service: CoordinatorService) -> Self {
        Self {
            listener,
            service: Arc::new(service),
        }
    }

    /// Load the partition directory and audit store named in `config` and bind.
    pub async fn bind(config: &CoordinatorConfig) -> Result<Self> {
        tracing::info!("Starting coordinator");
        tracing::info!("  Directory: {}", config.directory_path.display());
        tracing::info!("  Audit dir: {}", config.audit_dir.display());
        tracing::info!(
            "  Worker timeouts: connect {:?}, read {:?}",
            config.connect_timeout(),
            config.read_timeout()
        );
        if config.await_commit_acks {
            tracing::info!("  Awaiting COMMIT acknowledgements");
        }

        let directory = PartitionDirectory::load(&config.directory_path)?;
        for partition in 0..directory.partition_count() {
            let endpoints = directory.endpoints(partition);
            if endpoints.is_empty() {
                tracing::warn!("  Partition {} has no replicas", partition);
            } else {
                let names: Vec<String> = endpoints.iter().map(|ep| ep.to_string()).collect();
                tracing::info!("  Partition {}: {}", partition, names.join(", "));
            }
        }
        let audit = Arc::new(FileAuditStore::open(&config.audit_dir)?);
        let service = CoordinatorService::new(directory, audit, config);

        let listener = TcpListener::bind(config.bind_addr).await?;
        tracing::info!("  Listening on {}", listener.local_addr()?);
        Ok(Self::new(listener, service))
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!("✓ Coordinator ready");
        net::serve(self.listener, self.service, shutdown).await
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
