//! Boundary with the external index engine
//!
//! Two separate interfaces with different failure models:
//! - [`EngineProcess`]: the build CLI and the resident server process
//! - [`QueryClient`]: the line-delimited JSON query socket
//!
//! [`QueryServer`] implements the server side of the socket contract for any
//! [`QueryHandler`].

mod build;
mod client;
mod messages;
mod server;

pub use build::{BuildArtifacts, EngineProcess, ServerProcess, ENGINE_MANIFEST_FILE, INDEX_FILE};
pub use client::QueryClient;
pub use messages::{error_line, QueryRequest, QueryResponse, ResultRef};
pub use server::{QueryHandler, QueryServer, RunningServer};

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Which step of a query ran out of time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutPhase {
    Connect,
    Read,
}

impl std::fmt::Display for TimeoutPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutPhase::Connect => f.write_str("connect"),
            TimeoutPhase::Read => f.write_str("read"),
        }
    }
}

/// Query socket failures
///
/// `Unreachable`, `Timeout` and `Malformed` map to "server down",
/// "server slow" and "server returned garbage".
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Query server at {addr} is unreachable: {message}")]
    Unreachable { addr: String, message: String },

    #[error("Query server at {addr} timed out during {phase} after {after:?}")]
    Timeout {
        addr: String,
        phase: TimeoutPhase,
        after: Duration,
    },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Query server rejected the request: {0}")]
    Rejected(String),

    #[error("Query term must not be empty")]
    InvalidQuery,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Engine process failures
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("Failed to start engine {binary}: {source}")]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },

    #[error("Engine build failed ({status}): {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("Engine build timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("Expected artifact {0} is missing")]
    MissingArtifact(PathBuf),

    #[error("Invalid source directory {path}: {message}")]
    InvalidSource { path: PathBuf, message: String },

    #[error("Query server exited early ({status})")]
    ServerExited { status: ExitStatus },

    #[error("Query server not accepting connections after {after:?}")]
    NotReady { after: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Readiness of the index and query server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthReport {
    pub artifacts_present: bool,
    pub server_accepting: bool,
}

impl HealthReport {
    pub fn is_ready(&self) -> bool {
        self.artifacts_present && self.server_accepting
    }
}

/// Checks that build artifacts exist and the query port accepts connections
pub async fn check_health(engine: &EngineProcess, client: &QueryClient) -> HealthReport {
    HealthReport {
        artifacts_present: engine.artifacts().present(),
        server_accepting: client.ping().await,
    }
}
