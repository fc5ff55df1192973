//! Query client: one TCP connection per query

use crate::config::QueryConfig;
use crate::protocol::messages::{QueryRequest, QueryResponse};
use crate::protocol::{ProtocolError, TimeoutPhase};
use std::future::Future;
use std::io::ErrorKind;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Largest response line accepted from a server
const MAX_RESPONSE_BYTES: u64 = 8 * 1024 * 1024;

/// Stateless client for the query server
///
/// Holds only static configuration. Each call opens a fresh connection,
/// sends one request, reads one response line and drops the connection.
#[derive(Debug, Clone)]
pub struct QueryClient {
    host: String,
    port: u16,
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl QueryClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout,
            read_timeout,
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(
            config.host.clone(),
            config.port,
            config.connect_timeout(),
            config.read_timeout(),
        )
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Sends one query and waits for its response
    ///
    /// # Errors
    ///
    /// * `InvalidQuery` - empty term, rejected before any I/O
    /// * `Unreachable` - nothing accepts connections at the address
    /// * `Timeout` - connect or read took longer than configured
    /// * `Malformed` / `Rejected` - the server answered with something unusable
    pub async fn query(&self, term: &str) -> Result<QueryResponse, ProtocolError> {
        if term.is_empty() {
            return Err(ProtocolError::InvalidQuery);
        }
        let request = QueryRequest::new(term).encode()?;

        let mut stream = self.connect().await?;
        tracing::debug!("Sending query '{}' to {}", term, self.address());

        let exchange = async {
            stream.write_all(request.as_bytes()).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(&mut stream).take(MAX_RESPONSE_BYTES);
            let mut line = String::new();
            reader.read_line(&mut line).await?;
            Ok::<_, std::io::Error>(line)
        };

        let line = match timeout(self.read_timeout, exchange).await {
            Ok(Ok(line)) => line,
            Ok(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                return Err(ProtocolError::Malformed(format!("response is not UTF-8: {}", e)));
            }
            Ok(Err(e)) => return Err(ProtocolError::Io(e)),
            Err(_) => {
                return Err(ProtocolError::Timeout {
                    addr: self.address(),
                    phase: TimeoutPhase::Read,
                    after: self.read_timeout,
                });
            }
        };

        QueryResponse::decode(&line)
    }

    /// Whether the server currently accepts connections
    pub async fn ping(&self) -> bool {
        self.connect().await.is_ok()
    }

    async fn connect(&self) -> Result<TcpStream, ProtocolError> {
        let addr = self.address();
        let connecting = TcpStream::connect(addr.clone());
        connect_within(addr, self.connect_timeout, connecting).await
    }
}

/// Bounds a pending connection attempt by `limit`
///
/// A refused connection is `Unreachable`; an attempt still pending when the
/// limit runs out is a connect-phase `Timeout`.
async fn connect_within<F>(
    addr: String,
    limit: Duration,
    connecting: F,
) -> Result<TcpStream, ProtocolError>
where
    F: Future<Output = std::io::Result<TcpStream>>,
{
    match timeout(limit, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(ProtocolError::Unreachable {
            addr,
            message: e.to_string(),
        }),
        Err(_) => Err(ProtocolError::Timeout {
            addr,
            phase: TimeoutPhase::Connect,
            after: limit,
        }),
    }
}
