//! Network module.
//!
//! Contains the [`ConnectionService`] with its per-port listeners, the
//! transport session task, TLS loading and the hostname resolver.

mod connection;
mod dns;
mod listener;
mod service;
mod tls;

pub use dns::{DnsResolver, HostnameResolver};
pub use service::ConnectionService;
pub use tls::load_acceptor;
