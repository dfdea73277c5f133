//! Concurrent load generator

use crate::common::{AccountId, Amount, Result, Status};
use crate::ops::client::LedgerClient;
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub coordinator: String,
    pub clients: usize,
    pub ops_per_client: usize,
    /// Accounts are drawn from `first_account..first_account + account_span`
    pub first_account: AccountId,
    pub account_span: AccountId,
    /// Share of operations that are transfers; the rest are balance queries
    pub transfer_ratio: f64,
    pub timeout: Duration,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            coordinator: "127.0.0.1:6000".into(),
            clients: 50,
            ops_per_client: 20,
            first_account: 1000,
            account_span: 10_000,
            transfer_ratio: 0.5,
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    /// Requests answered with `OK`
    pub ok: usize,
    /// Requests answered with `ERROR`
    pub errors: usize,
    /// Requests with no usable answer (connection failures, timeouts)
    pub transport_failures: usize,
    pub elapsed: Duration,
}

impl LoadReport {
    fn merge(&mut self, other: &LoadReport) {
        self.ok += other.ok;
        self.errors += other.errors;
        self.transport_failures += other.transport_failures;
    }

    pub fn total(&self) -> usize {
        self.ok + self.errors + self.transport_failures
    }
}

/// Run `clients` tasks, each on its own connection, issuing random balance
/// queries and transfers.
pub async fn run_load(opts: &LoadOptions) -> Result<LoadReport> {
    let started = Instant::now();
    let mut tasks = JoinSet::new();
    for _ in 0..opts.clients {
        let opts = opts.clone();
        tasks.spawn(async move { client_loop(&opts).await });
    }

    let mut report = LoadReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(partial) => report.merge(&partial),
            Err(e) => tracing::warn!("load task failed: {}", e),
        }
    }
    report.elapsed = started.elapsed();
    Ok(report)
}

async fn client_loop(opts: &LoadOptions) -> LoadReport {
    let mut report = LoadReport::default();
    let mut client = match LedgerClient::connect(&opts.coordinator, opts.timeout).await {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("load client could not connect: {}", e);
            report.transport_failures = opts.ops_per_client;
            return report;
        }
    };

    for _ in 0..opts.ops_per_client {
        let response = if random_bool(opts.transfer_ratio) {
            let (from, to, amount) = random_transfer(opts);
            client.transfer(from, to, amount).await
        } else {
            client.balance(random_account(opts)).await
        };
        match response {
            Ok(rec) if rec.response_status() == Some(Status::Ok) => report.ok += 1,
            Ok(rec) => {
                tracing::debug!("load request answered {}", rec);
                report.errors += 1;
            }
            Err(e) if e.is_unreachable() => {
                tracing::warn!("load client lost its connection: {}", e);
                // everything left on this connection is lost too
                report.transport_failures += opts.ops_per_client - report.total();
                break;
            }
            Err(e) => {
                tracing::debug!("load request failed: {}", e);
                report.transport_failures += 1;
            }
        }
    }
    report
}

fn random_bool(p: f64) -> bool {
    rand::thread_rng().gen_bool(p.clamp(0.0, 1.0))
}

fn random_account(opts: &LoadOptions) -> AccountId {
    let span = opts.account_span.max(1);
    opts.first_account + rand::thread_rng().gen_range(0..span)
}

/// Two distinct accounts (when the span allows) and an amount in 1.00..=100.00.
fn random_transfer(opts: &LoadOptions) -> (AccountId, AccountId, Amount) {
    let from = random_account(opts);
    let mut to = random_account(opts);
    if to == from {
        to = from + 1;
    }
    let cents = rand::thread_rng().gen_range(100..=10_000);
    (from, to, Amount::from_cents(cents))
}
