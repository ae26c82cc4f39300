//! Reverse DNS for freshly accepted sessions.

use async_trait::async_trait;
use hickory_resolver::TokioResolver;
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use std::net::IpAddr;
use tracing::debug;

/// Resolves an address to a hostname.
///
/// Failure of any kind is reported as `None`; callers apply their own
/// timeout.
#[async_trait]
pub trait HostnameResolver: Send + Sync {
    async fn resolve(&self, ip: IpAddr) -> Option<String>;
}

/// PTR lookups through the system resolver configuration.
#[derive(Clone)]
pub struct DnsResolver {
    resolver: TokioResolver,
}

impl DnsResolver {
    pub fn new() -> Self {
        // Try system config, fall back to defaults
        let resolver = TokioResolver::builder_tokio()
            .map(|b| b.build())
            .unwrap_or_else(|_| {
                TokioResolver::builder_with_config(
                    ResolverConfig::default(),
                    TokioConnectionProvider::default(),
                )
                .build()
            });
        Self { resolver }
    }
}

impl Default for DnsResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostnameResolver for DnsResolver {
    async fn resolve(&self, ip: IpAddr) -> Option<String> {
        match self.resolver.reverse_lookup(ip).await {
            Ok(lookup) => lookup
                .iter()
                .next()
                .map(|name| name.to_utf8().trim_end_matches('.').to_string())
                .filter(|name| !name.is_empty()),
            Err(e) => {
                debug!(%ip, error = %e, "Reverse lookup failed");
                None
            }
        }
    }
}
