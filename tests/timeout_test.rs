//! Deadline behavior on both sides of a session.

use std::sync::Arc;
use std::time::Duration;

use minirpc::{dial_tcp, RpcError, Server, Service, SessionOptions};
use tokio::net::TcpListener;

fn slow_service() -> Service {
    Service::new("Bar")
        .method("Timeout", |args: i64| async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Ok(args)
        })
        .method("Fast", |args: i64| async move { Ok(args) })
}

async fn start_server() -> String {
    let server = Arc::new(Server::new());
    server.register(slow_service()).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.accept(listener).await });
    addr
}

#[tokio::test]
async fn test_client_side_deadline() {
    let addr = start_server().await;
    let client = dial_tcp(&addr, SessionOptions::default()).await.unwrap();

    let err = client
        .call_timeout::<_, i64>("Bar.Timeout", &1, Duration::from_secs(1))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timeout"));

    // the expired call left the pending table; its late response is
    // discarded and the session keeps working
    let out: i64 = client.call("Bar.Fast", &7).await.unwrap();
    assert_eq!(out, 7);
}

#[tokio::test]
async fn test_already_expired_deadline_returns_immediately() {
    let addr = start_server().await;
    let client = dial_tcp(&addr, SessionOptions::default()).await.unwrap();

    let started = std::time::Instant::now();
    let err = client
        .call_timeout::<_, i64>("Bar.Timeout", &1, Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::CallTimeout(_)));
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn test_server_side_handle_timeout_tears_down_session() {
    let addr = start_server().await;
    let options = SessionOptions::default().with_handle_timeout(Duration::from_millis(200));
    let client = dial_tcp(&addr, options).await.unwrap();

    let err = client.call::<_, i64>("Bar.Timeout", &1).await.unwrap_err();
    assert!(err.to_string().contains("timeout"));

    // the server closed the whole session after the timeout frame
    tokio::time::sleep(Duration::from_millis(100)).await;
    let err = client.call::<_, i64>("Bar.Fast", &7).await.unwrap_err();
    assert!(
        matches!(err, RpcError::Shutdown | RpcError::Terminated(_)),
        "unexpected error: {err}"
    );
}

#[tokio::test]
async fn test_zero_handle_timeout_means_unlimited() {
    let server = Arc::new(Server::new());
    server
        .register(Service::new("Nap").method("Short", |ms: u64| async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(ms)
        }))
        .unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move { server.accept(listener).await });

    let client = dial_tcp(&addr, SessionOptions::default()).await.unwrap();
    let out: u64 = client.call("Nap.Short", &300u64).await.unwrap();
    assert_eq!(out, 300);
}
