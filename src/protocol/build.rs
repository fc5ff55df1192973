//! Process lifecycle for the external index engine
//!
//! Two entry points, both run with the artifact directory as working
//! directory:
//! - `<engine> --build <source-dir>` must exit 0 and leave `index.bin` and
//!   `manifest.bin` behind
//! - `<engine> --server <port>` loads those files and stays resident on the
//!   query port

use crate::config::EngineConfig;
use crate::protocol::{BuildError, QueryClient};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::{Child, Command};

pub const INDEX_FILE: &str = "index.bin";
pub const ENGINE_MANIFEST_FILE: &str = "manifest.bin";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Keeps the end of a long stderr dump
const STDERR_TAIL_BYTES: usize = 4096;

/// Artifact pair produced by a successful build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildArtifacts {
    pub index: PathBuf,
    pub manifest: PathBuf,
}

impl BuildArtifacts {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index: dir.join(INDEX_FILE),
            manifest: dir.join(ENGINE_MANIFEST_FILE),
        }
    }

    pub fn present(&self) -> bool {
        self.index.is_file() && self.manifest.is_file()
    }

    fn paths(&self) -> [&Path; 2] {
        [&self.index, &self.manifest]
    }

    fn remove(&self) -> Result<(), BuildError> {
        for path in self.paths() {
            match std::fs::remove_file(path) {
                Ok(()) => tracing::debug!("Removed artifact {}", path.display()),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::Io(e)),
            }
        }
        Ok(())
    }
}

/// Handle on the external engine binary
#[derive(Debug, Clone)]
pub struct EngineProcess {
    binary: PathBuf,
    artifact_dir: PathBuf,
    build_timeout: Duration,
}

impl EngineProcess {
    pub fn new(binary: impl Into<PathBuf>, artifact_dir: impl Into<PathBuf>, build_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            artifact_dir: artifact_dir.into(),
            build_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.binary.clone(),
            config.artifact_directory.clone(),
            config.build_timeout(),
        )
    }

    pub fn artifacts(&self) -> BuildArtifacts {
        BuildArtifacts::in_dir(&self.artifact_dir)
    }

    /// Builds the index over `source_dir`
    ///
    /// Artifacts left by an earlier build are removed before the engine
    /// starts, and again if the build fails, so files on disk after an error
    /// never pass for a valid index.
    pub async fn build(&self, source_dir: &Path) -> Result<BuildArtifacts, BuildError> {
        let source = source_dir
            .canonicalize()
            .map_err(|e| BuildError::InvalidSource {
                path: source_dir.to_path_buf(),
                message: e.to_string(),
            })?;
        if !source.is_dir() {
            return Err(BuildError::InvalidSource {
                path: source,
                message: "not a directory".to_string(),
            });
        }

        std::fs::create_dir_all(&self.artifact_dir)?;
        let artifacts = self.artifacts();
        artifacts.remove()?;

        let program = self.program()?;
        tracing::info!(
            "Building index from {} with {}",
            source.display(),
            program.display()
        );
        let started = Instant::now();

        let child = Command::new(&program)
            .arg("--build")
            .arg(&source)
            .current_dir(&self.artifact_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Spawn {
                binary: program.clone(),
                source: e,
            })?;

        // Dropping the child on timeout kills it
        let output = match tokio::time::timeout(self.build_timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                artifacts.remove()?;
                return Err(BuildError::TimedOut {
                    after: self.build_timeout,
                });
            }
        };

        if !output.status.success() {
            artifacts.remove()?;
            return Err(BuildError::Failed {
                status: output.status,
                stderr: stderr_tail(&output.stderr),
            });
        }

        for path in artifacts.paths() {
            if !path.is_file() {
                return Err(BuildError::MissingArtifact(path.to_path_buf()));
            }
        }

        tracing::info!("Index build finished in {:.1}s", started.elapsed().as_secs_f64());
        Ok(artifacts)
    }

    /// Starts the resident query server on `port`
    pub fn spawn_server(&self, port: u16) -> Result<ServerProcess, BuildError> {
        let artifacts = self.artifacts();
        for path in artifacts.paths() {
            if !path.is_file() {
                return Err(BuildError::MissingArtifact(path.to_path_buf()));
            }
        }

        let program = self.program()?;
        tracing::info!("Starting query server {} on port {}", program.display(), port);

        let child = Command::new(&program)
            .arg("--server")
            .arg(port.to_string())
            .current_dir(&self.artifact_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BuildError::Spawn {
                binary: program,
                source: e,
            })?;

        Ok(ServerProcess { child, port })
    }

    /// Absolute program path, since the child runs in another directory
    ///
    /// Bare names are left for `PATH` lookup.
    fn program(&self) -> Result<PathBuf, BuildError> {
        if self.binary.components().count() <= 1 && !self.binary.is_absolute() {
            return Ok(self.binary.clone());
        }
        self.binary.canonicalize().map_err(|e| BuildError::Spawn {
            binary: self.binary.clone(),
            source: e,
        })
    }
}

/// Running `--server` child, killed when dropped
#[derive(Debug)]
pub struct ServerProcess {
    child: Child,
    port: u16,
}

impl ServerProcess {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Polls until the server accepts connections
    pub async fn wait_ready(&mut self, client: &QueryClient, deadline: Duration) -> Result<(), BuildError> {
        let started = Instant::now();
        loop {
            if let Some(status) = self.child.try_wait()? {
                return Err(BuildError::ServerExited { status });
            }
            if client.ping().await {
                tracing::info!("Query server ready on port {}", self.port);
                return Ok(());
            }
            if started.elapsed() >= deadline {
                return Err(BuildError::NotReady { after: deadline });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }

    pub async fn shutdown(mut self) -> Result<(), BuildError> {
        if self.child.try_wait()?.is_none() {
            self.child.kill().await?;
        }
        tracing::info!("Query server on port {} stopped", self.port);
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= STDERR_TAIL_BYTES {
        return text.to_string();
    }
    let mut start = text.len() - STDERR_TAIL_BYTES;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}
