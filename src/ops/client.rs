//! Client connection to the coordinator

use crate::common::wire::kind;
use crate::common::{AccountId, Amount, Error, Record, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// One persistent connection; requests are answered in order.
pub struct LedgerClient {
    addr: String,
    reader: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
    timeout: Duration,
}

impl LedgerClient {
    pub async fn connect(addr: &str, timeout_after: Duration) -> Result<Self> {
        let stream = timeout(timeout_after, TcpStream::connect(addr))
            .await
            .map_err(|_| unreachable(addr, "connect timed out"))?
            .map_err(|e| unreachable(addr, e))?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            addr: addr.to_string(),
            reader: BufReader::new(reader).lines(),
            writer,
            timeout: timeout_after,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Send one request and wait for its response line.
    pub async fn send(&mut self, req: &Record) -> Result<Record> {
        let mut line = req.encode();
        line.push('\n');
        let (reader, writer) = (&mut self.reader, &mut self.writer);
        let exchange = async move {
            writer.write_all(line.as_bytes()).await?;
            reader.next_line().await
        };
        let response = match timeout(self.timeout, exchange).await {
            Err(_) => return Err(unreachable(&self.addr, "no response in time")),
            Ok(Err(e)) => return Err(unreachable(&self.addr, e)),
            Ok(Ok(None)) => return Err(unreachable(&self.addr, "connection closed")),
            Ok(Ok(Some(response))) => response,
        };
        Record::decode(&response)
    }

    pub async fn balance(&mut self, account: AccountId) -> Result<Record> {
        self.send(&Record::request(kind::QUERY_ACCOUNT).with("account", account))
            .await
    }

    pub async fn transfer(&mut self, from: AccountId, to: AccountId, amount: Amount) -> Result<Record> {
        let req = Record::request(kind::TRANSFER)
            .with("from", from)
            .with("to", to)
            .with("amount", amount);
        self.send(&req).await
    }

    pub async fn create(&mut self, account: AccountId, initial: Amount) -> Result<Record> {
        let req = Record::request(kind::CREATE_ACCOUNT)
            .with("account", account)
            .with("initial", initial);
        self.send(&req).await
    }

    pub async fn delete(&mut self, account: AccountId) -> Result<Record> {
        self.send(&Record::request(kind::DELETE_ACCOUNT).with("account", account))
            .await
    }

    pub async fn history(&mut self, account: AccountId) -> Result<Record> {
        self.send(&Record::request(kind::HISTORY).with("account", account))
            .await
    }

    pub async fn loans(&mut self, account: AccountId) -> Result<Record> {
        self.send(&Record::request(kind::LOAN_STATUS).with("account", account))
            .await
    }

    pub async fn reconcile(&mut self) -> Result<Record> {
        self.send(&Record::request(kind::RECONCILE)).await
    }
}

fn unreachable(addr: &str, reason: impl ToString) -> Error {
    Error::NodeUnreachable {
        node: addr.to_string(),
        reason: reason.to_string(),
    }
}
