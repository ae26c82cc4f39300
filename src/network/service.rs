//! Connection Service.
//!
//! Owns one [`PortListener`] per configured plain port and, when TLS
//! material is configured, one per TLS port. Outbound traffic arrives as
//! [`SendMessage`] signals and is routed to whichever listener holds the
//! session, plain listeners first.

use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::connection::{ConnectionContext, TransportHandle};
use super::listener::{PortListener, Transport};
use super::tls::load_acceptor;
use crate::config::NetworkConfig;
use crate::error::{HandlerResult, NetworkError};
use crate::events::{DisconnectRequested, SendMessage};
use crate::handlers::CommandRouter;
use crate::proto::{CRLF, CommandParser, Message};
use crate::signals::{SignalBus, SignalListener};
use crate::state::{SessionId, SessionManager};

pub struct ConnectionService {
    config: NetworkConfig,
    ctx: Arc<ConnectionContext>,
    plain: DashMap<u16, PortListener>,
    tls: DashMap<u16, PortListener>,
}

impl ConnectionService {
    pub fn new(
        config: NetworkConfig,
        bus: Arc<SignalBus>,
        router: Arc<CommandRouter>,
        sessions: Arc<SessionManager>,
        parser: Arc<dyn CommandParser>,
    ) -> Self {
        let ctx = Arc::new(ConnectionContext {
            bus,
            router,
            sessions,
            parser,
            max_line_length: config.max_line_length,
            send_queue: config.send_queue.max(1),
        });
        Self {
            config,
            ctx,
            plain: DashMap::new(),
            tls: DashMap::new(),
        }
    }

    /// Subscribe to outbound message and disconnect signals.
    pub fn attach(self: &Arc<Self>) {
        self.ctx.bus.subscribe::<SendMessage, _>(Arc::clone(self));
        self.ctx.bus.subscribe::<DisconnectRequested, _>(Arc::clone(self));
    }

    /// Load TLS material if configured, then bind every plain port followed
    /// by every TLS port.
    ///
    /// On failure, listeners bound so far are stopped again.
    pub async fn start(&self) -> Result<(), NetworkError> {
        let acceptor = match (&self.config.tls_cert_path, self.config.tls_key_path()) {
            (Some(cert), Some(key)) => Some(load_acceptor(
                cert,
                key,
                self.config.tls_cert_password.as_deref(),
            )?),
            _ => None,
        };

        if let Err(e) = self.bind_all(acceptor).await {
            self.stop();
            return Err(e);
        }

        info!(
            plain = self.plain.len(),
            tls = self.tls.len(),
            "Connection service started"
        );
        Ok(())
    }

    async fn bind_all(&self, acceptor: Option<tokio_rustls::TlsAcceptor>) -> Result<(), NetworkError> {
        let address = self.config.bind_address;

        for &port in &self.config.ports {
            let listener =
                PortListener::bind(address, port, Transport::Plain, Arc::clone(&self.ctx)).await?;
            self.plain.insert(listener.local_addr().port(), listener);
        }

        let Some(acceptor) = acceptor else {
            if !self.config.tls_ports.is_empty() {
                debug!("No TLS certificate configured, TLS ports not bound");
            }
            return Ok(());
        };

        for &port in &self.config.tls_ports {
            let transport = Transport::Tls(acceptor.clone());
            let listener = PortListener::bind(address, port, transport, Arc::clone(&self.ctx)).await?;
            self.tls.insert(listener.local_addr().port(), listener);
        }
        Ok(())
    }

    /// Stop every plain listener, then every TLS listener. Sessions they own
    /// are dropped.
    pub fn stop(&self) {
        for listener in self.plain.iter() {
            listener.stop();
        }
        self.plain.clear();
        for listener in self.tls.iter() {
            listener.stop();
        }
        self.tls.clear();
        debug!("Connection service stopped");
    }

    /// Addresses of the bound plain listeners.
    pub fn plain_addrs(&self) -> Vec<SocketAddr> {
        self.plain.iter().map(|l| l.local_addr()).collect()
    }

    /// Addresses of the bound TLS listeners.
    pub fn tls_addrs(&self) -> Vec<SocketAddr> {
        self.tls.iter().map(|l| l.local_addr()).collect()
    }

    /// Live transport sessions across all listeners.
    pub fn session_count(&self) -> usize {
        self.plain.iter().map(|l| l.session_count()).sum::<usize>()
            + self.tls.iter().map(|l| l.session_count()).sum::<usize>()
    }

    fn find(&self, id: &SessionId) -> Option<TransportHandle> {
        self.plain
            .iter()
            .find_map(|l| l.get(id))
            .or_else(|| self.tls.iter().find_map(|l| l.get(id)))
    }

    /// Write `lines` to the session as one CRLF-joined payload ending in
    /// CRLF.
    ///
    /// Returns `false` when the session is gone or `lines` is empty; nothing
    /// is written in either case.
    pub fn send_messages<S: AsRef<str>>(&self, id: &SessionId, lines: &[S]) -> bool {
        if lines.is_empty() {
            return false;
        }
        let Some(transport) = self.find(id) else {
            debug!(session_id = %id, "Dropping outbound message for vanished session");
            return false;
        };

        let mut payload = lines
            .iter()
            .map(|line| line.as_ref())
            .collect::<Vec<&str>>()
            .join(CRLF);
        if !payload.ends_with(CRLF) {
            payload.push_str(CRLF);
        }
        transport.send(payload)
    }

    /// Close the session once its queued output is flushed.
    pub fn disconnect(&self, id: &SessionId) -> bool {
        self.disconnect_with(id, None)
    }

    fn disconnect_with(&self, id: &SessionId, farewell: Option<&Message>) -> bool {
        match self.find(id) {
            Some(transport) => {
                transport.close(farewell.map(|m| format!("{m}{CRLF}")));
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl SignalListener<SendMessage> for ConnectionService {
    async fn on_signal(&self, signal: &SendMessage) -> HandlerResult {
        self.send_messages(&signal.session_id, &[signal.message.to_string()]);
        Ok(())
    }
}

#[async_trait]
impl SignalListener<DisconnectRequested> for ConnectionService {
    async fn on_signal(&self, signal: &DisconnectRequested) -> HandlerResult {
        if !self.disconnect_with(&signal.session_id, signal.farewell.as_ref()) {
            warn!(session_id = %signal.session_id, reason = %signal.reason, "Disconnect for unknown session");
        }
        Ok(())
    }
}
