//! CLI for talking to a minibank cluster

use clap::{Parser, Subcommand};
use minibank::common::{AccountId, Amount, Record, Status};
use minibank::coordinator::PartitionDirectory;
use minibank::ops::{run_load, seed_cluster, LedgerClient, LoadOptions, SeedOptions};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "minibank")]
#[command(about = "minibank ledger CLI")]
#[command(version)]
struct Cli {
    /// Coordinator address
    #[arg(long, default_value = "127.0.0.1:6000")]
    coordinator: String,

    /// Request timeout in seconds
    #[arg(long, default_value = "10")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an account balance
    Balance { account: AccountId },

    /// Move money between two accounts
    Transfer {
        from: AccountId,
        to: AccountId,
        amount: Amount,
    },

    /// Open an account
    Create {
        account: AccountId,

        /// Opening balance
        #[arg(default_value = "0")]
        initial: Amount,
    },

    /// Close an account
    Delete { account: AccountId },

    /// Recent transactions of an account
    History { account: AccountId },

    /// Loans of the account holder
    Loans { account: AccountId },

    /// Total balance across all partitions
    Reconcile,

    /// Write starting snapshots for every replica in a partition directory
    Seed {
        /// Partition directory file
        #[arg(long)]
        directory: PathBuf,

        /// Output directory
        #[arg(long, default_value = "./data")]
        out: PathBuf,

        /// Number of accounts
        #[arg(long, default_value = "10000")]
        accounts: usize,

        /// First account id
        #[arg(long, default_value = "1000")]
        start_id: AccountId,

        /// Lowest opening balance
        #[arg(long, default_value = "50.00")]
        min_balance: Amount,

        /// Highest opening balance
        #[arg(long, default_value = "5000.00")]
        max_balance: Amount,
    },

    /// Hammer the coordinator with concurrent queries and transfers
    Load {
        /// Concurrent clients
        #[arg(long, default_value = "50")]
        clients: usize,

        /// Operations per client
        #[arg(long, default_value = "20")]
        ops: usize,

        /// First account id to pick from
        #[arg(long, default_value = "1000")]
        first_account: AccountId,

        /// How many consecutive account ids to pick from
        #[arg(long, default_value = "10000")]
        accounts: AccountId,

        /// Share of operations that are transfers
        #[arg(long, default_value = "0.5")]
        transfer_ratio: f64,
    },
}

fn print_response(resp: &Record) {
    match resp.response_status() {
        Some(Status::Ok) => {}
        _ => {
            println!(
                "Error: {}",
                resp.get("error").unwrap_or("unexpected response")
            );
            if let Some(tx_id) = resp.get("tx_id") {
                println!("  Transaction: {}", tx_id);
            }
            return;
        }
    }
    for (key, value) in [
        ("account", "Account"),
        ("balance", "Balance"),
        ("total_balance", "Total balance"),
        ("tx_id", "Transaction"),
    ] {
        if let Some(v) = resp.get(key) {
            println!("  {}: {}", value, v);
        }
    }
    if let Some(rows) = resp.list("data") {
        if rows.is_empty() {
            println!("  (no entries)");
        }
        for row in rows {
            println!("  {}", row);
        }
    }
}

async fn connect(addr: &str, timeout: Duration) -> anyhow::Result<LedgerClient> {
    Ok(LedgerClient::connect(addr, timeout).await?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let timeout = Duration::from_secs(cli.timeout);

    match cli.command {
        Commands::Seed {
            directory,
            out,
            accounts,
            start_id,
            min_balance,
            max_balance,
        } => {
            let directory = PartitionDirectory::load(&directory)?;
            let opts = SeedOptions {
                accounts,
                start_id,
                min_balance,
                max_balance,
            };
            let report = seed_cluster(&directory, &out, &opts)?;
            println!("Seed report:");
            println!("  Accounts: {}", report.accounts);
            println!("  Snapshots written: {}", report.snapshots.len());
            println!("  Total balance: {}", report.total_balance);
        }

        Commands::Load {
            clients,
            ops,
            first_account,
            accounts,
            transfer_ratio,
        } => {
            let opts = LoadOptions {
                coordinator: cli.coordinator,
                clients,
                ops_per_client: ops,
                first_account,
                account_span: accounts,
                transfer_ratio,
                timeout,
            };
            println!("Starting {} clients x {} operations", clients, ops);
            let report = run_load(&opts).await?;
            let secs = report.elapsed.as_secs_f64();
            println!("Load report:");
            println!("  OK: {}", report.ok);
            println!("  Errors: {}", report.errors);
            println!("  Transport failures: {}", report.transport_failures);
            println!("  Elapsed: {:.2}s", secs);
            if secs > 0.0 {
                println!("  Throughput: {:.1} req/s", report.total() as f64 / secs);
            }
        }

        Commands::Balance { account } => {
            print_response(&connect(&cli.coordinator, timeout).await?.balance(account).await?);
        }
        Commands::Transfer { from, to, amount } => {
            let mut client = connect(&cli.coordinator, timeout).await?;
            print_response(&client.transfer(from, to, amount).await?);
        }
        Commands::Create { account, initial } => {
            let mut client = connect(&cli.coordinator, timeout).await?;
            print_response(&client.create(account, initial).await?);
        }
        Commands::Delete { account } => {
            print_response(&connect(&cli.coordinator, timeout).await?.delete(account).await?);
        }
        Commands::History { account } => {
            print_response(&connect(&cli.coordinator, timeout).await?.history(account).await?);
        }
        Commands::Loans { account } => {
            print_response(&connect(&cli.coordinator, timeout).await?.loans(account).await?);
        }
        Commands::Reconcile => {
            print_response(&connect(&cli.coordinator, timeout).await?.reconcile().await?);
        }
    }

    Ok(())
}
