//! Integration tests for the TLS listener.

mod common;

use common::server::CLIENT_HOSTNAME;
use common::{TestClient, TestServer, TlsFixture};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_tls_session_is_served() {
    let tls = TlsFixture::generate().expect("Failed to mint certificate");
    let connector = tls.connector().unwrap();
    let server = TestServer::start_tls(tls).await.expect("Failed to start test server");

    let tcp = TcpStream::connect(server.tls_addr()).await.unwrap();
    let stream = connector
        .connect(TlsFixture::server_name(), tcp)
        .await
        .expect("TLS handshake failed");
    let mut client = TestClient::from_stream(stream);

    let notice = client.skip_auth_notices().await.unwrap();
    assert_eq!(
        notice.arg(1).map(str::to_string),
        Some(format!("*** Found your hostname: {CLIENT_HOSTNAME}"))
    );

    client.send_raw("PING :secure").await.unwrap();
    let pong = client.recv().await.unwrap();
    assert_eq!(pong.arg(1), Some("secure"));

    let sessions = server.server().sessions().sessions();
    assert_eq!(sessions.len(), 1);
    assert!(sessions[0].is_tls());

    server.stop().await;
}

#[tokio::test]
async fn test_plain_listener_runs_alongside_tls() {
    let tls = TlsFixture::generate().expect("Failed to mint certificate");
    let server = TestServer::start_tls(tls).await.expect("Failed to start test server");

    assert_eq!(server.server().connections().plain_addrs().len(), 1);
    assert_eq!(server.server().connections().tls_addrs().len(), 1);

    let mut client = TestClient::connect(server.plain_addr()).await.unwrap();
    client.skip_auth_notices().await.unwrap();
    assert!(!server.server().sessions().sessions()[0].is_tls());

    server.stop().await;
}

#[tokio::test]
async fn test_failed_handshake_does_not_register_session() {
    let tls = TlsFixture::generate().expect("Failed to mint certificate");
    let server = TestServer::start_tls(tls).await.expect("Failed to start test server");

    let mut client = TestClient::connect(server.tls_addr()).await.unwrap();
    client.send_raw("NICK plaintext").await.unwrap();
    client.expect_closed().await.unwrap();

    assert!(server.server().sessions().is_empty());
    server.stop().await;
}
