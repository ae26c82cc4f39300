//! Integration test common infrastructure.
//!
//! Provides an in-process test server, a line-oriented test client and
//! self-signed TLS material.

pub mod client;
pub mod server;
pub mod tls;

#[allow(unused_imports)]
pub use client::TestClient;
#[allow(unused_imports)]
pub use server::TestServer;
#[allow(unused_imports)]
pub use tls::TlsFixture;
