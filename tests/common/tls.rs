//! Self-signed TLS material for listener tests.

use rcgen::CertifiedKey;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};

/// A certificate for `localhost` written to a temporary directory.
pub struct TlsFixture {
    _dir: TempDir,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    cert_der: CertificateDer<'static>,
}

impl TlsFixture {
    pub fn generate() -> anyhow::Result<Self> {
        let CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec!["localhost".to_string()])?;

        let dir = tempfile::tempdir()?;
        let cert_path = dir.path().join("cert.pem");
        let key_path = dir.path().join("key.pem");
        std::fs::write(&cert_path, cert.pem())?;
        std::fs::write(&key_path, key_pair.serialize_pem())?;

        Ok(Self {
            _dir: dir,
            cert_path,
            key_path,
            cert_der: cert.der().clone(),
        })
    }

    /// A connector that trusts only this certificate.
    pub fn connector(&self) -> anyhow::Result<TlsConnector> {
        let mut roots = RootCertStore::empty();
        roots.add(self.cert_der.clone())?;
        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        Ok(TlsConnector::from(Arc::new(config)))
    }

    pub fn server_name() -> ServerName<'static> {
        ServerName::try_from("localhost").expect("valid server name")
    }
}
