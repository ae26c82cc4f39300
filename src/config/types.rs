//! Core configuration types and loading.

use serde::{Deserialize, Deserializer};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid port {0:?}")]
    InvalidPort(String),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Listener configuration.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Signal bus tuning.
    #[serde(default)]
    pub signals: SignalsConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host name used as the source of server notices (e.g., "irc.example.net").
    pub host: String,
    /// Network name.
    #[serde(default)]
    pub network: String,
    /// Prometheus metrics HTTP port. 0 disables the endpoint.
    #[serde(default)]
    pub metrics_port: u16,
    /// Raise the default log level to `debug`.
    #[serde(default)]
    pub debug: bool,
}

/// Plain and TLS listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// Plain ports, written as a comma-separated list ("6667,6668").
    #[serde(default = "default_ports", deserialize_with = "deserialize_ports")]
    pub ports: Vec<u16>,
    /// TLS ports. Only bound when `tls_cert_path` is set.
    #[serde(default = "default_tls_ports", deserialize_with = "deserialize_ports")]
    pub tls_ports: Vec<u16>,
    /// PEM certificate chain.
    #[serde(default)]
    pub tls_cert_path: Option<PathBuf>,
    /// PEM PKCS#8 private key, plain or encrypted. Defaults to
    /// `tls_cert_path` when absent.
    #[serde(default)]
    pub tls_key_path: Option<PathBuf>,
    /// Password for an encrypted private key.
    #[serde(default)]
    pub tls_cert_password: Option<String>,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    #[serde(default = "default_dns_timeout_ms")]
    pub dns_timeout_ms: u64,
    /// Longest accepted inbound line, terminator excluded.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
    /// Outbound queue depth per session. A session whose queue fills up is
    /// disconnected.
    #[serde(default = "default_send_queue")]
    pub send_queue: usize,
}

impl NetworkConfig {
    pub fn dns_timeout(&self) -> Duration {
        Duration::from_millis(self.dns_timeout_ms)
    }

    /// Key file to load, falling back to the certificate bundle.
    pub fn tls_key_path(&self) -> Option<&Path> {
        self.tls_key_path.as_deref().or(self.tls_cert_path.as_deref())
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            tls_ports: default_tls_ports(),
            tls_cert_path: None,
            tls_key_path: None,
            tls_cert_password: None,
            bind_address: default_bind_address(),
            dns_timeout_ms: default_dns_timeout_ms(),
            max_line_length: default_max_line_length(),
            send_queue: default_send_queue(),
        }
    }
}

/// Signal bus configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SignalsConfig {
    /// Dispatch worker parallelism.
    #[serde(default = "default_dispatch_tasks")]
    pub dispatch_tasks: usize,
    /// Bound on queued dispatch jobs. Absent means unbounded.
    #[serde(default)]
    pub queue_capacity: Option<usize>,
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            dispatch_tasks: default_dispatch_tasks(),
            queue_capacity: None,
        }
    }
}

/// Parse a comma-separated port list such as `"6667, 6668"`.
///
/// An empty string yields an empty list; empty entries and values outside
/// `1..=65535` are rejected.
pub fn parse_port_list(value: &str) -> Result<Vec<u16>, ConfigError> {
    if value.trim().is_empty() {
        return Ok(Vec::new());
    }

    value
        .split(',')
        .map(str::trim)
        .map(|entry| match entry.parse::<u16>() {
            Ok(port) => check_port(port).map_err(|_| ConfigError::InvalidPort(entry.to_string())),
            Err(_) => Err(ConfigError::InvalidPort(entry.to_string())),
        })
        .collect()
}

fn check_port(port: u16) -> Result<u16, ConfigError> {
    if port == 0 {
        return Err(ConfigError::InvalidPort(port.to_string()));
    }
    Ok(port)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortList {
    Text(String),
    Single(u16),
    List(Vec<u16>),
}

fn deserialize_ports<'de, D>(deserializer: D) -> Result<Vec<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    let ports = match PortList::deserialize(deserializer)? {
        PortList::Text(text) => parse_port_list(&text),
        PortList::Single(port) => check_port(port).map(|port| vec![port]),
        PortList::List(ports) => ports.into_iter().map(check_port).collect(),
    };
    ports.map_err(serde::de::Error::custom)
}
