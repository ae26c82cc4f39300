//! In-process test server.
//!
//! Runs the full runtime on ephemeral loopback ports with a canned
//! hostname resolver, so tests never touch real DNS.

use abyssd::Server;
use abyssd::config::{Config, NetworkConfig, ServerConfig, SignalsConfig};
use abyssd::network::HostnameResolver;
use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use super::tls::TlsFixture;

pub const SERVER_NAME: &str = "irc.test";
#[allow(dead_code)]
pub const CLIENT_HOSTNAME: &str = "client.test";

/// Answers every lookup with the same result.
pub struct StaticResolver(pub Option<String>);

#[async_trait]
impl HostnameResolver for StaticResolver {
    async fn resolve(&self, _ip: IpAddr) -> Option<String> {
        self.0.clone()
    }
}

/// A running test server instance.
pub struct TestServer {
    server: Server,
    _tls: Option<TlsFixture>,
}

impl TestServer {
    /// Plain listener only; hostnames resolve to [`CLIENT_HOSTNAME`].
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Some(CLIENT_HOSTNAME.to_string()), None).await
    }

    /// Plain and TLS listeners using a freshly minted certificate.
    #[allow(dead_code)]
    pub async fn start_tls(tls: TlsFixture) -> anyhow::Result<Self> {
        Self::start_with(Some(CLIENT_HOSTNAME.to_string()), Some(tls)).await
    }

    /// A single dispatch worker keeps outbound order deterministic.
    pub async fn start_with(hostname: Option<String>, tls: Option<TlsFixture>) -> anyhow::Result<Self> {
        let network = NetworkConfig {
            ports: vec![0],
            tls_ports: vec![0],
            tls_cert_path: tls.as_ref().map(|t| t.cert_path.clone()),
            tls_key_path: tls.as_ref().map(|t| t.key_path.clone()),
            bind_address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            dns_timeout_ms: 1000,
            ..NetworkConfig::default()
        };
        let config = Config {
            server: ServerConfig {
                host: SERVER_NAME.to_string(),
                network: "TestNet".to_string(),
                metrics_port: 0,
                debug: false,
            },
            network,
            signals: SignalsConfig {
                dispatch_tasks: 1,
                queue_capacity: None,
            },
        };

        let server = Server::with_resolver(config, Arc::new(StaticResolver(hostname)));
        server.start().await?;
        Ok(Self { server, _tls: tls })
    }

    pub fn plain_addr(&self) -> SocketAddr {
        self.server.connections().plain_addrs()[0]
    }

    #[allow(dead_code)]
    pub fn tls_addr(&self) -> SocketAddr {
        self.server.connections().tls_addrs()[0]
    }

    pub fn server(&self) -> &Server {
        &self.server
    }

    pub async fn stop(self) {
        self.server.stop().await;
    }
}
