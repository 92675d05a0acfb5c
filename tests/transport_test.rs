//! Transport adapters: Unix-domain sockets, HTTP CONNECT, scheme dialing.

use std::sync::Arc;
use std::time::Duration;

use minirpc::{
    dial_http, serve_http, xdial, RpcError, Server, Service, SessionOptions,
};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, UnixListener};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Args {
    a: i64,
    b: i64,
}

fn arith_service() -> Service {
    Service::new("Arith").method("Sum", |args: Args| async move { Ok(args.a + args.b) })
}

#[tokio::test]
async fn test_unix_socket_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("minirpc.sock");

    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move { server.accept_unix(listener).await });

    let rpc_addr = format!("unix://{}", path.display());
    let client = xdial(&rpc_addr, SessionOptions::default()).await.unwrap();

    let sum: i64 = client.call("Arith.Sum", &Args { a: 3, b: 4 }).await.unwrap();
    assert_eq!(sum, 7);
}

#[tokio::test]
async fn test_http_connect_session() {
    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_http(server, listener));

    let client = dial_http(&addr, SessionOptions::default()).await.unwrap();
    let sum: i64 = client.call("Arith.Sum", &Args { a: 2, b: 3 }).await.unwrap();
    assert_eq!(sum, 5);
}

#[tokio::test]
async fn test_xdial_http_scheme() {
    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_http(server, listener));

    let client = xdial(&format!("http://{addr}"), SessionOptions::default())
        .await
        .unwrap();
    let sum: i64 = client.call("Arith.Sum", &Args { a: 1, b: 1 }).await.unwrap();
    assert_eq!(sum, 2);
}

#[tokio::test]
async fn test_wrong_connect_status_fails_dial() {
    // a fake HTTP server that answers every request with a 404
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return,
            };
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf).await;
            let _ = stream
                .write_all(b"HTTP/1.0 404 Not Found\r\n\r\n")
                .await;
        }
    });

    let err = dial_http(&addr, SessionOptions::default()).await.unwrap_err();
    assert!(matches!(err, RpcError::ConnectStatus(_)));
    assert!(err.to_string().contains("unexpected connect status"));
}

#[tokio::test]
async fn test_non_connect_request_is_rejected() {
    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(serve_http(server, listener));

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream
        .write_all(b"GET /_minirpc_/ HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.0 405"));
    assert!(response.contains("must CONNECT"));
}

#[tokio::test]
async fn test_handshake_or_close() {
    // a server never dispatches anything for a client that opens with junk
    let server = Arc::new(Server::new());
    server.register(arith_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    {
        let server = Arc::clone(&server);
        tokio::spawn(async move { server.accept(listener).await });
    }

    let mut stream = tokio::net::TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"\x00\x00\x00\x04junk").await.unwrap();

    // the server drops the connection without answering
    let mut buf = Vec::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut buf))
        .await
        .expect("server should close the connection")
        .unwrap();
    assert!(buf.is_empty());
    assert_eq!(server.service("Arith").unwrap().num_calls("Sum"), Some(0));
}
