//! Integration tests for framekv
//!
//! Tests the complete system end-to-end: server, client, framing, error
//! containment, and persistence

use framekv::{frame, protocol, Client, ErrorCode, Request, Response, Server, ServerConfig};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Helper function to start a test server
async fn start_test_server(port: u16, wal_path: Option<PathBuf>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = ServerConfig {
            bind_addr: format!("127.0.0.1:{}", port),
            wal_path,
            idle_timeout: Duration::from_secs(60),
        };

        let server = Server::new(config).await.unwrap();
        let _ = server.run().await;
    })
}

/// Helper function to wait for server to be ready
async fn wait_for_server(addr: &str) -> Result<(), Box<dyn std::error::Error>> {
    for _ in 0..50 {
        if let Ok(client) = Client::connect(addr).await {
            let _ = client.close().await;
            return Ok(());
        }
        sleep(Duration::from_millis(100)).await;
    }
    Err("Server failed to start".into())
}

/// Send a request envelope on a raw connection
async fn send_request(stream: &mut TcpStream, request: &Request) {
    let payload = protocol::encode_request(request).unwrap();
    frame::write_frame(stream, &payload).await.unwrap();
}

/// Read one response envelope from a raw connection, `None` if the server
/// closed it
async fn read_response(stream: &mut TcpStream) -> Option<Response> {
    let payload = frame::read_frame(stream).await.unwrap()?;
    Some(protocol::decode_response(&payload).unwrap())
}

#[tokio::test]
async fn test_basic_operations() {
    let port = 18080;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();

    // SET then GET
    client.set("test_key", "test_value").await.unwrap();
    let value = client.get("test_key").await.unwrap();
    assert_eq!(value, Some("test_value".to_string()));

    // GET non-existent key
    let value = client.get("nonexistent").await.unwrap();
    assert_eq!(value, None);

    // Overwrite: last write wins
    client.set("test_key", "replaced").await.unwrap();
    let value = client.get("test_key").await.unwrap();
    assert_eq!(value, Some("replaced".to_string()));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_missing_key_keeps_connection_open() {
    let port = 18081;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // SetRequest{a, 1} -> SetResponse
    send_request(
        &mut stream,
        &Request::Set {
            key: "a".to_string(),
            value: "1".to_string(),
        },
    )
    .await;
    assert_eq!(read_response(&mut stream).await, Some(Response::Set));

    // GetRequest{a} -> GetResponse{a, 1}
    send_request(
        &mut stream,
        &Request::Get {
            key: "a".to_string(),
        },
    )
    .await;
    assert_eq!(
        read_response(&mut stream).await,
        Some(Response::Get {
            key: "a".to_string(),
            value: "1".to_string(),
        })
    );

    // GetRequest{missing} -> ErrorResponse{KeyNotFound}, connection stays open
    send_request(
        &mut stream,
        &Request::Get {
            key: "missing".to_string(),
        },
    )
    .await;
    match read_response(&mut stream).await {
        Some(Response::Error { code, .. }) => assert_eq!(code, ErrorCode::KeyNotFound),
        other => panic!("unexpected response: {:?}", other),
    }

    // Further requests on the same connection still work
    send_request(
        &mut stream,
        &Request::Get {
            key: "a".to_string(),
        },
    )
    .await;
    assert_eq!(
        read_response(&mut stream).await,
        Some(Response::Get {
            key: "a".to_string(),
            value: "1".to_string(),
        })
    );
}

#[tokio::test]
async fn test_unknown_request_type_is_recoverable() {
    let port = 18082;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // Well-formed JSON that matches no request variant
    frame::write_frame(&mut stream, br#"{"Delete":{"key":"a"}}"#)
        .await
        .unwrap();
    match read_response(&mut stream).await {
        Some(Response::Error { code, .. }) => assert_eq!(code, ErrorCode::UnknownRequestType),
        other => panic!("unexpected response: {:?}", other),
    }

    // The session survives and keeps serving
    send_request(
        &mut stream,
        &Request::Set {
            key: "a".to_string(),
            value: "1".to_string(),
        },
    )
    .await;
    assert_eq!(read_response(&mut stream).await, Some(Response::Set));
}

#[tokio::test]
async fn test_malformed_envelope_closes_only_that_session() {
    let port = 18083;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    // Session B is mid-conversation when A misbehaves
    let mut client_b = Client::connect(&addr).await.unwrap();
    client_b.set("b_key", "b_value").await.unwrap();

    // Session A sends garbage payload in a valid binary frame
    let mut stream_a = TcpStream::connect(&addr).await.unwrap();
    frame::write_frame(&mut stream_a, b"\x00\xffdefinitely not an envelope")
        .await
        .unwrap();

    match read_response(&mut stream_a).await {
        Some(Response::Error { code, .. }) => assert_eq!(code, ErrorCode::Malformed),
        other => panic!("unexpected response: {:?}", other),
    }
    // ...after which the server closes A
    assert_eq!(read_response(&mut stream_a).await, None);

    // Session B is unaffected
    let value = client_b.get("b_key").await.unwrap();
    assert_eq!(value, Some("b_value".to_string()));
    client_b.close().await.unwrap();
}

#[tokio::test]
async fn test_text_frame_is_rejected() {
    let port = 18084;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut stream = TcpStream::connect(&addr).await.unwrap();

    // Hand-rolled text frame: kind 0x1, 5-byte payload
    let payload = b"hello";
    let mut message = vec![frame::KIND_TEXT];
    message.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    message.extend_from_slice(payload);
    stream.write_all(&message).await.unwrap();

    match read_response(&mut stream).await {
        Some(Response::Error { code, .. }) => assert_eq!(code, ErrorCode::Malformed),
        other => panic!("unexpected response: {:?}", other),
    }
    assert_eq!(read_response(&mut stream).await, None);
}

#[tokio::test]
async fn test_concurrent_clients() {
    let port = 18085;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let num_clients = 10;
    let ops_per_client = 100;
    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let addr = addr.clone();
        let handle = tokio::spawn(async move {
            let mut client = Client::connect(&addr).await.unwrap();

            // Each client works on its own keys; nobody interferes
            for i in 0..ops_per_client {
                let key = format!("client_{}_key_{}", client_id, i);
                let value = format!("client_{}_value_{}", client_id, i);

                client.set(&key, &value).await.unwrap();

                let retrieved = client.get(&key).await.unwrap();
                assert_eq!(retrieved, Some(value));
            }

            client.close().await.unwrap();
        });
        handles.push(handle);
    }

    for handle in handles {
        handle.await.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_writes_to_same_key() {
    let port = 18086;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let num_clients = 8;
    let mut handles = Vec::new();

    for client_id in 0..num_clients {
        let addr = addr.clone();
        handles.push(tokio::spawn(async move {
            let mut client = Client::connect(&addr).await.unwrap();
            client
                .set("contested", &format!("writer_{}", client_id))
                .await
                .unwrap();
            client.close().await.unwrap();
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    // The surviving value is exactly one of the written ones, never torn
    let mut client = Client::connect(&addr).await.unwrap();
    let value = client.get("contested").await.unwrap().unwrap();
    assert!(
        (0..num_clients).any(|id| value == format!("writer_{}", id)),
        "unexpected value: {}",
        value
    );
    client.close().await.unwrap();
}

#[tokio::test]
async fn test_persistence_and_recovery() {
    let temp_file = NamedTempFile::new().unwrap();
    let wal_path = temp_file.path().to_path_buf();
    let port = 18087;
    let addr = format!("127.0.0.1:{}", port);

    // First server instance
    let server_handle = start_test_server(port, Some(wal_path.clone())).await;
    wait_for_server(&addr).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();
    client.set("persistent_key1", "persistent_value1").await.unwrap();
    client.set("persistent_key2", "persistent_value2").await.unwrap();
    client.set("persistent_key2", "rewritten").await.unwrap();
    client.close().await.unwrap();

    // Stop the server
    server_handle.abort();
    sleep(Duration::from_millis(500)).await;

    // New server instance over the same WAL
    let port2 = 18088;
    let addr2 = format!("127.0.0.1:{}", port2);
    let _server_handle2 = start_test_server(port2, Some(wal_path)).await;
    wait_for_server(&addr2).await.unwrap();

    let mut client2 = Client::connect(&addr2).await.unwrap();

    let value1 = client2.get("persistent_key1").await.unwrap();
    assert_eq!(value1, Some("persistent_value1".to_string()));

    let value2 = client2.get("persistent_key2").await.unwrap();
    assert_eq!(value2, Some("rewritten".to_string()));

    client2.close().await.unwrap();
}

#[tokio::test]
async fn test_large_values() {
    let port = 18089;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();

    // 1MB value crosses many frame reads
    let large_value = "x".repeat(1024 * 1024);
    client.set("large_key", &large_value).await.unwrap();

    let retrieved = client.get("large_key").await.unwrap();
    assert_eq!(retrieved, Some(large_value));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_special_characters() {
    let port = 18090;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = start_test_server(port, None).await;
    wait_for_server(&addr).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();

    let special_key = "key_with_特殊字符_and_émojis_🚀";
    let special_value = "value_with_newlines\nand\ttabs\rand_quotes\"'";

    client.set(special_key, special_value).await.unwrap();

    let retrieved = client.get(special_key).await.unwrap();
    assert_eq!(retrieved, Some(special_value.to_string()));

    client.close().await.unwrap();
}

#[tokio::test]
async fn test_idle_connection_is_closed() {
    let port = 18091;
    let addr = format!("127.0.0.1:{}", port);

    let _server_handle = tokio::spawn(async move {
        let config = ServerConfig {
            bind_addr: format!("127.0.0.1:{}", port),
            wal_path: None,
            idle_timeout: Duration::from_millis(200),
        };
        let server = Server::new(config).await.unwrap();
        let _ = server.run().await;
    });
    wait_for_server(&addr).await.unwrap();

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    sleep(Duration::from_millis(600)).await;

    // The server gave up on us while we sat silent
    assert_eq!(read_response(&mut stream).await, None);
}

#[tokio::test]
async fn test_graceful_shutdown() {
    let port = 18092;
    let addr = format!("127.0.0.1:{}", port);

    let config = ServerConfig {
        bind_addr: addr.clone(),
        wal_path: None,
        idle_timeout: Duration::from_secs(60),
    };
    let server = std::sync::Arc::new(Server::new(config).await.unwrap());

    let runner = {
        let server = std::sync::Arc::clone(&server);
        tokio::spawn(async move { server.run().await })
    };
    wait_for_server(&addr).await.unwrap();

    let mut client = Client::connect(&addr).await.unwrap();
    client.set("k", "v").await.unwrap();
    client.close().await.unwrap();

    server.shutdown().unwrap();

    // The accept loop stops and run() returns cleanly
    let result = tokio::time::timeout(Duration::from_secs(10), runner)
        .await
        .expect("server did not stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_connect_to_absent_server_fails() {
    let result = Client::connect("127.0.0.1:99999").await;
    assert!(result.is_err());
}
