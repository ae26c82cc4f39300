//! Per-port listeners.
//!
//! Every bound port owns the transport sessions it accepted. The connection
//! service searches listeners by session id when it needs to write to or
//! close a session.

use dashmap::DashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use super::connection::{self, ConnectionContext, TransportHandle};
use crate::error::NetworkError;
use crate::state::SessionId;

pub(crate) type TransportMap = Arc<DashMap<SessionId, TransportHandle>>;

#[derive(Clone)]
pub(crate) enum Transport {
    Plain,
    Tls(TlsAcceptor),
}

impl Transport {
    fn label(&self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Tls(_) => "tls",
        }
    }
}

pub(crate) struct PortListener {
    local_addr: SocketAddr,
    transports: TransportMap,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl PortListener {
    /// Bind `address:port` and start accepting.
    pub async fn bind(
        address: IpAddr,
        port: u16,
        transport: Transport,
        ctx: Arc<ConnectionContext>,
    ) -> Result<Self, NetworkError> {
        let listener = TcpListener::bind(SocketAddr::new(address, port))
            .await
            .map_err(|source| NetworkError::Bind { port, source })?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, kind = transport.label(), "Listener bound");

        let transports: TransportMap = Arc::new(DashMap::new());
        let cancel = CancellationToken::new();
        let span = info_span!("listener", address = %local_addr, kind = transport.label());
        let task = tokio::spawn(
            accept_loop(
                listener,
                transport,
                ctx,
                Arc::clone(&transports),
                cancel.clone(),
            )
            .instrument(span),
        );

        Ok(Self {
            local_addr,
            transports,
            cancel,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn get(&self, id: &SessionId) -> Option<TransportHandle> {
        self.transports.get(id).map(|entry| entry.value().clone())
    }

    pub fn session_count(&self) -> usize {
        self.transports.len()
    }

    /// Stop accepting and drop every session this listener owns.
    pub fn stop(&self) {
        self.cancel.cancel();
        self.task.abort();
    }
}

impl Drop for PortListener {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(
    listener: TcpListener,
    transport: Transport,
    ctx: Arc<ConnectionContext>,
    transports: TransportMap,
    cancel: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, addr)) => {
                debug!(%addr, "Accepted socket");
                tokio::spawn(serve(
                    stream,
                    addr,
                    transport.clone(),
                    Arc::clone(&ctx),
                    Arc::clone(&transports),
                    cancel.child_token(),
                ));
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
    debug!("Accept loop stopped");
}

async fn serve(
    stream: TcpStream,
    addr: SocketAddr,
    transport: Transport,
    ctx: Arc<ConnectionContext>,
    transports: TransportMap,
    shutdown: CancellationToken,
) {
    match transport {
        Transport::Plain => connection::run(stream, addr, false, ctx, transports, shutdown).await,
        Transport::Tls(acceptor) => {
            let handshake = tokio::select! {
                _ = shutdown.cancelled() => return,
                handshake = acceptor.accept(stream) => handshake,
            };
            match handshake {
                Ok(tls_stream) => {
                    connection::run(tls_stream, addr, true, ctx, transports, shutdown).await
                }
                Err(e) => warn!(%addr, error = %e, "TLS handshake failed"),
            }
        }
    }
}
