//! Integration tests for the query socket
//!
//! Servers here are in-process: either the reference `QueryServer` or a raw
//! listener scripted to misbehave in one particular way.

use std::time::{Duration, Instant};
use sumi_ingest::protocol::{
    ProtocolError, QueryClient, QueryServer, ResultRef, TimeoutPhase,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

fn client(port: u16, timeout: Duration) -> QueryClient {
    QueryClient::new("127.0.0.1", port, timeout, timeout)
}

/// Listener that reads one request line and answers with `reply`
async fn scripted_server(reply: &'static [u8]) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut line = String::new();
        BufReader::new(&mut socket).read_line(&mut line).await.unwrap();
        socket.write_all(reply).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    port
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn test_round_trip_against_canned_server() {
    let canned = |_: &str| {
        vec![
            ResultRef::Path("doc_1.txt".to_string()),
            ResultRef::Path("doc_7.txt".to_string()),
        ]
    };
    let server = QueryServer::bind("127.0.0.1:0", canned).await.unwrap();
    let running = server.spawn().unwrap();

    let response = client(running.local_addr().port(), Duration::from_secs(2))
        .query("foo")
        .await
        .unwrap();

    assert_eq!(response.query, "foo");
    assert_eq!(response.count as usize, response.results.len());
    assert_eq!(response.count, 2);

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_each_query_uses_new_connection() {
    let server = QueryServer::bind("127.0.0.1:0", |term: &str| {
        vec![ResultRef::Id(term.len() as u64)]
    })
    .await
    .unwrap();
    let running = server.spawn().unwrap();
    let client = client(running.local_addr().port(), Duration::from_secs(2));

    for term in ["a", "bb", "ccc"] {
        let response = client.query(term).await.unwrap();
        assert_eq!(response.query, term);
        assert_eq!(response.results, vec![ResultRef::Id(term.len() as u64)]);
    }

    running.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_no_listener_is_unreachable_quickly() {
    let port = free_port();
    let started = Instant::now();

    let result = client(port, Duration::from_secs(1)).query("foo").await;

    assert!(matches!(result, Err(ProtocolError::Unreachable { .. })));
    assert!(started.elapsed() < Duration::from_millis(1500));
}

#[tokio::test]
async fn test_silent_server_is_read_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let holder = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(socket);
    });

    let started = Instant::now();
    let result = client(port, Duration::from_millis(300)).query("foo").await;

    assert!(matches!(
        result,
        Err(ProtocolError::Timeout {
            phase: TimeoutPhase::Read,
            ..
        })
    ));
    assert!(started.elapsed() < Duration::from_secs(2));
    holder.abort();
}

#[tokio::test]
async fn test_garbage_response_is_malformed() {
    let port = scripted_server(b"<html>oops</html>\n").await;
    let result = client(port, Duration::from_secs(2)).query("foo").await;
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}

#[tokio::test]
async fn test_empty_response_is_malformed() {
    let port = scripted_server(b"").await;
    let result = client(port, Duration::from_secs(2)).query("foo").await;
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}

#[tokio::test]
async fn test_missing_count_is_malformed() {
    let port = scripted_server(b"{\"query\":\"foo\",\"results\":[]}\n").await;
    let result = client(port, Duration::from_secs(2)).query("foo").await;
    assert!(matches!(result, Err(ProtocolError::Malformed(_))));
}

#[tokio::test]
async fn test_engine_error_object_is_rejected() {
    let port = scripted_server(b"{\"error\":\"Invalid query\"}\n").await;
    let result = client(port, Duration::from_secs(2)).query("foo").await;
    assert!(matches!(result, Err(ProtocolError::Rejected(_))));
}

#[tokio::test]
async fn test_response_without_trailing_newline_accepted() {
    let port = scripted_server(b"{\"query\":\"foo\",\"count\":0,\"results\":[]}").await;
    let response = client(port, Duration::from_secs(2)).query("foo").await.unwrap();
    assert_eq!(response.count, 0);
    assert!(response.results.is_empty());
}
