//! Coordinator binary

use clap::Parser;
use minibank::common::Settings;
use minibank::Coordinator;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minibank-coord")]
#[command(about = "minibank coordinator: routing, reads with failover, 2PC writes")]
#[command(version)]
struct Cli {
    /// Settings file (JSON or TOML); MINIBANK_* variables apply on top
    #[arg(long)]
    config: Option<PathBuf>,

    /// Client-facing bind address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Partition directory file
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Audit and loan store directory
    #[arg(long)]
    audit_dir: Option<PathBuf>,

    /// Connect timeout for worker calls, in milliseconds
    #[arg(long)]
    connect_timeout_ms: Option<u64>,

    /// Read timeout for worker calls, in milliseconds
    #[arg(long)]
    read_timeout_ms: Option<u64>,

    /// Wait for COMMIT acknowledgements before answering clients
    #[arg(long)]
    await_commit_acks: bool,

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

    // CLI flags win over the settings file
    let mut config = settings.coordinator.unwrap_or_default();
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(directory) = cli.directory {
        config.directory_path = directory;
    }
    if let Some(audit_dir) = cli.audit_dir {
        config.audit_dir = audit_dir;
    }
    if let Some(ms) = cli.connect_timeout_ms {
        config.connect_timeout_ms = ms;
    }
    if let Some(ms) = cli.read_timeout_ms {
        config.read_timeout_ms = ms;
    }
    if cli.await_commit_acks {
        config.await_commit_acks = true;
    }

    let coordinator = Coordinator::bind(&config).await?;
    coordinator.run_until_ctrl_c().await?;
    Ok(())
}
