//! Worker binary

use clap::Parser;
use minibank::common::Settings;
use minibank::WorkerServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minibank-worker")]
#[command(about = "minibank worker: one replica of one partition")]
#[command(version)]
struct Cli {
    /// Settings file (JSON or TOML); MINIBANK_* variables apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bind address for coordinator traffic
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Balance snapshot file
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Audit and loan store directory
    #[arg(long)]
    audit_dir: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let level = cli.log_level.clone().unwrap_or(settings.log_level.clone());
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = settings.worker.unwrap_or_default();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = snapshot;
    }
    if let Some(audit_dir) = cli.audit_dir {
        config.audit_dir = audit_dir;
    }

    let worker = WorkerServer::bind(&config).await?;
    worker.run_until_ctrl_c().await?;
    Ok(())
}
