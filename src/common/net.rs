//! Line-delimited TCP plumbing
//!
//! Servers run one task per accepted connection. Each connection is a
//! sequential loop: read one line, hand it to the service, write one line
//! back, until the peer closes.

use crate::common::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

/// Turns one request line into one response line.
pub trait LineService: Send + Sync + 'static {
    fn call(&self, line: String) -> impl Future<Output = String> + Send;
}

/// Accept connections until `shutdown` resolves. Connections already
/// accepted keep running until their peer disconnects.
pub async fn serve<S, F>(listener: TcpListener, service: Arc<S>, shutdown: F) -> Result<()>
where
    S: LineService,
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Listener shutting down");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => spawn_connection(stream, peer, &service),
                Err(e) => tracing::warn!("Failed to accept connection: {}", e),
            }
        }
    }
    Ok(())
}

fn spawn_connection<S: LineService>(stream: TcpStream, peer: SocketAddr, service: &Arc<S>) {
    let service = Arc::clone(service);
    tokio::spawn(async move {
        tracing::debug!(peer = %peer, "connection opened");
        match handle_connection(stream, service).await {
            Ok(()) => tracing::debug!(peer = %peer, "connection closed"),
            Err(e) => tracing::warn!(peer = %peer, error = %e, "connection closed with error"),
        }
    });
}

async fn handle_connection<S: LineService>(stream: TcpStream, service: Arc<S>) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mut response = service.call(line).await;
        response.push('\n');
        writer.write_all(response.as_bytes()).await?;
    }
    Ok(())
}

fn unreachable(node: &str, reason: impl ToString) -> Error {
    Error::NodeUnreachable {
        node: node.to_string(),
        reason: reason.to_string(),
    }
}

/// One request over a fresh connection. Every failure to get a response
/// line (refused, timed out, closed early) is reported as
/// [`Error::NodeUnreachable`].
pub async fn request_line(
    addr: &str,
    line: &str,
    connect_timeout: Duration,
    read_timeout: Duration,
) -> Result<String> {
    let stream = timeout(connect_timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| unreachable(addr, "connect timed out"))?
        .map_err(|e| unreachable(addr, e))?;

    let exchange = async move {
        let (reader, mut writer) = stream.into_split();
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        BufReader::new(reader).lines().next_line().await
    };
    match timeout(read_timeout, exchange).await {
        Err(_) => Err(unreachable(addr, "read timed out")),
        Ok(Err(e)) => Err(unreachable(addr, e)),
        Ok(Ok(None)) => Err(unreachable(addr, "connection closed without a response")),
        Ok(Ok(Some(response))) => Ok(response),
    }
}
