//! Default value functions for configuration.

use std::net::{IpAddr, Ipv4Addr};

// =============================================================================
// Network Defaults
// =============================================================================

pub fn default_ports() -> Vec<u16> {
    vec![6667]
}

pub fn default_tls_ports() -> Vec<u16> {
    vec![6697]
}

pub fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Reverse DNS lookups give up after this many milliseconds.
pub fn default_dns_timeout_ms() -> u64 {
    5000
}

pub fn default_max_line_length() -> usize {
    8191
}

/// Outbound payloads queued per session before it is dropped as a slow
/// consumer.
pub fn default_send_queue() -> usize {
    512
}

// =============================================================================
// Signal Bus Defaults
// =============================================================================

pub fn default_dispatch_tasks() -> usize {
    crate::signals::DEFAULT_DISPATCH_TASKS
}
