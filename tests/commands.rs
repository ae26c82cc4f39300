//! Integration tests for the built-in command handlers and router events.

mod common;

use abyssd::events::{CommandReceived, ParseFailed};
use common::server::{CLIENT_HOSTNAME, SERVER_NAME};
use common::{TestClient, TestServer};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

async fn connected() -> (TestServer, TestClient) {
    let server = TestServer::start().await.expect("Failed to start test server");
    let mut client = TestClient::connect(server.plain_addr())
        .await
        .expect("Failed to connect");
    client.skip_auth_notices().await.expect("Missing NOTICE AUTH");
    (server, client)
}

#[tokio::test]
async fn test_ping_pong() {
    let (server, mut client) = connected().await;

    client.send_raw("PING :test").await.unwrap();
    let pong = client.recv().await.expect("Failed to receive PONG");

    assert_eq!(pong.prefix.as_deref(), Some(SERVER_NAME));
    assert_eq!(pong.code(), "PONG");
    assert_eq!(pong.arg(0), Some(SERVER_NAME));
    assert_eq!(pong.arg(1), Some("test"));

    server.stop().await;
}

#[tokio::test]
async fn test_ping_without_token() {
    let (server, mut client) = connected().await;

    client.send_raw("PING").await.unwrap();
    let reply = client.recv().await.unwrap();
    assert_eq!(reply.code(), "409");

    server.stop().await;
}

#[tokio::test]
async fn test_quit_sends_error_then_closes() {
    let (server, mut client) = connected().await;

    client.send_raw("QUIT :Test complete").await.unwrap();
    let line = client.recv_line().await.unwrap();
    assert_eq!(
        line,
        format!("ERROR :Closing Link: {CLIENT_HOSTNAME} (Test complete)\r\n")
    );
    client.expect_closed().await.unwrap();

    server.stop().await;
}

#[tokio::test]
async fn test_quit_default_reason() {
    let (server, mut client) = connected().await;

    client.send_raw("QUIT").await.unwrap();
    let error = client.recv().await.unwrap();
    assert_eq!(error.code(), "ERROR");
    assert!(error.arg(0).unwrap().ends_with("(Client Quit)"));

    server.stop().await;
}

#[tokio::test]
async fn test_nick_is_recorded_and_collisions_rejected() {
    let (server, mut alice) = connected().await;

    alice.send_raw("NICK alice").await.unwrap();
    // PING acts as a barrier: commands of one session run in order.
    alice.send_raw("PING :sync").await.unwrap();
    assert_eq!(alice.recv().await.unwrap().code(), "PONG");
    assert!(server.server().sessions().find_by_nickname("ALICE").is_some());

    let mut bob = TestClient::connect(server.plain_addr()).await.unwrap();
    bob.skip_auth_notices().await.unwrap();
    bob.send_raw("NICK Alice").await.unwrap();
    let reply = bob.recv().await.unwrap();
    assert_eq!(reply.code(), "433");
    assert_eq!(reply.arg(0), Some("*"));
    assert_eq!(reply.arg(1), Some("Alice"));

    server.stop().await;
}

#[tokio::test]
async fn test_unknown_commands_are_published() {
    let (server, mut client) = connected().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    server
        .server()
        .bus()
        .subscribe_fn(move |signal: Arc<CommandReceived>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(signal.command.code().to_string());
                Ok(())
            }
        });

    client.send_raw("privmsg #chan :hello").await.unwrap();
    client.send_raw("PING :sync").await.unwrap();
    assert_eq!(client.recv().await.unwrap().code(), "PONG");
    tokio::time::sleep(Duration::from_millis(50)).await;

    let seen = seen.lock().clone();
    assert!(seen.contains(&"PRIVMSG".to_string()));
    assert!(seen.contains(&"PING".to_string()));

    server.stop().await;
}

#[tokio::test]
async fn test_parse_failure_keeps_connection_open() {
    let (server, mut client) = connected().await;
    let failures = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&failures);
    server
        .server()
        .bus()
        .subscribe_fn(move |signal: Arc<ParseFailed>| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().push(signal.line.clone());
                Ok(())
            }
        });

    client.send_raw(":prefix.only").await.unwrap();
    client.send_raw("PING :alive").await.unwrap();
    let pong = client.recv().await.unwrap();
    assert_eq!(pong.arg(1), Some("alive"));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(failures.lock().clone(), vec![":prefix.only".to_string()]);

    server.stop().await;
}

#[tokio::test]
async fn test_registered_callback_replies() {
    let (server, mut client) = connected().await;
    let router = Arc::clone(server.server().router());
    let r = Arc::clone(&router);
    router
        .register_callback("HELLO", move |id, _msg| {
            let r = Arc::clone(&r);
            async move {
                r.send_notice(id, "*", "world").await;
                Ok(())
            }
        })
        .unwrap();

    client.send_raw("HELLO").await.unwrap();
    let notice = client.recv().await.unwrap();
    assert_eq!(notice.code(), "NOTICE");
    assert_eq!(notice.arg(1), Some("world"));

    server.stop().await;
}
