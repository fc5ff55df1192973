//! Reference query server
//!
//! Serves the same wire contract as the external engine over any
//! [`QueryHandler`]. Each accepted connection gets its own task and carries
//! exactly one request/response cycle.

use crate::protocol::messages::{error_line, QueryRequest, QueryResponse, ResultRef};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const MAX_REQUEST_BYTES: u64 = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Answers search terms for a [`QueryServer`]
pub trait QueryHandler: Send + Sync {
    fn search(&self, term: &str) -> Vec<ResultRef>;
}

impl<F> QueryHandler for F
where
    F: Fn(&str) -> Vec<ResultRef> + Send + Sync,
{
    fn search(&self, term: &str) -> Vec<ResultRef> {
        self(term)
    }
}

pub struct QueryServer {
    listener: TcpListener,
    handler: Arc<dyn QueryHandler>,
}

impl QueryServer {
    /// Binds the listening socket; use port 0 for an ephemeral port
    pub async fn bind(addr: &str, handler: impl QueryHandler + 'static) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self {
            listener,
            handler: Arc::new(handler),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until `shutdown` resolves
    pub async fn serve<F>(self, shutdown: F) -> io::Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::debug!("Query server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((socket, peer)) => {
                            let handler = Arc::clone(&self.handler);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(socket, handler.as_ref()).await {
                                    tracing::debug!("Connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => tracing::warn!("Failed to accept connection: {}", e),
                    }
                }
            }
        }
    }

    /// Runs the server on a background task
    pub fn spawn(self) -> io::Result<RunningServer> {
        let addr = self.local_addr()?;
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(self.serve(async {
            let _ = rx.await;
        }));

        Ok(RunningServer {
            addr,
            shutdown: Some(tx),
            task,
        })
    }
}

/// Handle to a server started with [`QueryServer::spawn`]
pub struct RunningServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<io::Result<()>>,
}

impl RunningServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting connections and waits for the accept loop to exit
    pub async fn shutdown(mut self) -> io::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match (&mut self.task).await {
            Ok(result) => result,
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        if self.shutdown.is_some() {
            self.task.abort();
        }
    }
}

async fn handle_connection(mut socket: TcpStream, handler: &dyn QueryHandler) -> io::Result<()> {
    let mut line = String::new();
    let read = {
        let mut reader = BufReader::new(&mut socket).take(MAX_REQUEST_BYTES);
        tokio::time::timeout(REQUEST_TIMEOUT, reader.read_line(&mut line)).await
    };

    let reply = match read {
        Ok(Ok(_)) => match QueryRequest::decode(&line) {
            Ok(request) => {
                let results = handler.search(&request.query);
                tracing::debug!("Query '{}' matched {} results", request.query, results.len());
                QueryResponse::new(request.query, results)
                    .encode()
                    .unwrap_or_else(|e| error_line(&e.to_string()))
            }
            Err(_) => error_line("Invalid query"),
        },
        Ok(Err(_)) => error_line("Invalid query"),
        Err(_) => return Ok(()),
    };

    socket.write_all(reply.as_bytes()).await?;
    socket.shutdown().await
}
