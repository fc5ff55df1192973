//! Integration tests for the engine build lifecycle
//!
//! Each test writes a tiny shell script standing in for the engine binary.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use sumi_ingest::protocol::{BuildError, EngineProcess, QueryClient, ENGINE_MANIFEST_FILE, INDEX_FILE};
use tempfile::tempdir;

/// Scripts are written and executed one test at a time to avoid ETXTBSY
static ENGINE_LOCK: Mutex<()> = Mutex::new(());

/// Builds artifacts only when the source directory has at least one entry
const BUILDING_ENGINE: &str = r#"#!/bin/sh
if [ "$1" = "--build" ]; then
    if [ -z "$(ls -A "$2")" ]; then
        echo "no documents in $2" >&2
        exit 1
    fi
    echo index > index.bin
    echo manifest > manifest.bin
    exit 0
fi
exit 3
"#;

fn write_engine(dir: &Path, script: &str) -> PathBuf {
    let path = dir.join("engine.sh");
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn engine(binary: PathBuf, artifacts: &Path, timeout: Duration) -> EngineProcess {
    EngineProcess::new(binary, artifacts, timeout)
}

#[tokio::test]
async fn test_empty_source_fails_and_stale_artifacts_invalidated() {
    let _guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tools = tempdir().unwrap();
    let source = tempdir().unwrap();
    let artifacts = tempdir().unwrap();
    std::fs::write(artifacts.path().join(INDEX_FILE), "old").unwrap();
    std::fs::write(artifacts.path().join(ENGINE_MANIFEST_FILE), "old").unwrap();

    let engine = engine(
        write_engine(tools.path(), BUILDING_ENGINE),
        artifacts.path(),
        Duration::from_secs(10),
    );
    let result = engine.build(source.path()).await;

    match result {
        Err(BuildError::Failed { status, stderr }) => {
            assert_eq!(status.code(), Some(1));
            assert!(stderr.contains("no documents"));
        }
        other => panic!("expected build failure, got {:?}", other),
    }
    assert!(!engine.artifacts().present());
    assert!(!artifacts.path().join(INDEX_FILE).exists());
}

#[tokio::test]
async fn test_successful_build_produces_artifacts() {
    let _guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tools = tempdir().unwrap();
    let source = tempdir().unwrap();
    let artifacts = tempdir().unwrap();
    std::fs::write(source.path().join("doc_1.txt"), "Home\n\nwelcome").unwrap();

    let engine = engine(
        write_engine(tools.path(), BUILDING_ENGINE),
        artifacts.path(),
        Duration::from_secs(10),
    );
    let built = engine.build(source.path()).await.unwrap();

    assert_eq!(built.index, artifacts.path().join(INDEX_FILE));
    assert_eq!(built.manifest, artifacts.path().join(ENGINE_MANIFEST_FILE));
    assert!(built.present());
}

#[tokio::test]
async fn test_zero_exit_without_artifacts_is_failure() {
    let _guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tools = tempdir().unwrap();
    let source = tempdir().unwrap();
    let artifacts = tempdir().unwrap();
    std::fs::write(artifacts.path().join(ENGINE_MANIFEST_FILE), "old").unwrap();

    let script = "#!/bin/sh\necho index > index.bin\nexit 0\n";
    let engine = engine(
        write_engine(tools.path(), script),
        artifacts.path(),
        Duration::from_secs(10),
    );
    let result = engine.build(source.path()).await;

    assert!(matches!(
        result,
        Err(BuildError::MissingArtifact(path)) if path.ends_with(ENGINE_MANIFEST_FILE)
    ));
}

#[tokio::test]
async fn test_slow_build_times_out() {
    let _guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tools = tempdir().unwrap();
    let source = tempdir().unwrap();
    let artifacts = tempdir().unwrap();

    let engine = engine(
        write_engine(tools.path(), "#!/bin/sh\nsleep 5\n"),
        artifacts.path(),
        Duration::from_millis(300),
    );
    let started = std::time::Instant::now();
    let result = engine.build(source.path()).await;

    assert!(matches!(result, Err(BuildError::TimedOut { .. })));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_server_that_exits_is_reported() {
    let _guard = ENGINE_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let tools = tempdir().unwrap();
    let artifacts = tempdir().unwrap();
    std::fs::write(artifacts.path().join(INDEX_FILE), "i").unwrap();
    std::fs::write(artifacts.path().join(ENGINE_MANIFEST_FILE), "m").unwrap();

    let engine = engine(
        write_engine(tools.path(), BUILDING_ENGINE),
        artifacts.path(),
        Duration::from_secs(10),
    );

    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = QueryClient::new(
        "127.0.0.1",
        port,
        Duration::from_millis(200),
        Duration::from_millis(200),
    );

    let mut server = engine.spawn_server(port).unwrap();
    let result = server.wait_ready(&client, Duration::from_secs(5)).await;

    assert!(matches!(result, Err(BuildError::ServerExited { .. })));
    server.shutdown().await.unwrap();
}
