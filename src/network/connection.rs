//! Transport session task.
//!
//! One task per accepted socket. The read half runs in the task itself and
//! feeds parsed commands to the router; a spawned writer drains a bounded
//! outbound queue so bus listeners never wait on socket I/O. A session
//! whose queue fills up is dropped as a slow consumer.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, trace, warn};

use crate::events::{ParseFailed, SessionAdded, SessionRemoved};
use crate::handlers::CommandRouter;
use crate::proto::{CommandParser, LineCodec, ProtocolError};
use crate::signals::SignalBus;
use crate::state::{SessionId, SessionManager};
use crate::telemetry::spans;

use super::listener::TransportMap;

/// Upper bound on flushing the write half once a session ends.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Everything a transport session needs, shared by all listeners.
pub(crate) struct ConnectionContext {
    pub bus: Arc<SignalBus>,
    pub router: Arc<CommandRouter>,
    pub sessions: Arc<SessionManager>,
    pub parser: Arc<dyn CommandParser>,
    pub max_line_length: usize,
    pub send_queue: usize,
}

enum Outbound {
    Data(String),
    Close,
}

/// Sending side of a live transport session.
#[derive(Clone)]
pub(crate) struct TransportHandle {
    tx: mpsc::Sender<Outbound>,
    cancel: CancellationToken,
}

impl TransportHandle {
    /// Queue an already framed payload. `false` if the writer is gone or
    /// the queue is full, in which case the session is dropped.
    pub fn send(&self, payload: String) -> bool {
        self.enqueue(Outbound::Data(payload))
    }

    /// Close after everything queued so far, plus `farewell`, is written.
    pub fn close(&self, farewell: Option<String>) {
        if let Some(line) = farewell
            && !self.enqueue(Outbound::Data(line))
        {
            return;
        }
        if !self.enqueue(Outbound::Close) {
            self.cancel.cancel();
        }
    }

    fn enqueue(&self, item: Outbound) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("Outbound queue full, dropping slow consumer");
                crate::metrics::record_sendq_exceeded();
                self.cancel.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Drive one accepted stream until either side closes it or `shutdown`
/// fires.
pub(crate) async fn run<S>(
    stream: S,
    addr: SocketAddr,
    is_tls: bool,
    ctx: Arc<ConnectionContext>,
    transports: TransportMap,
    shutdown: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let id = SessionId::new();
    ctx.sessions.add_session(id, addr.ip(), is_tls);
    crate::metrics::set_connected_sessions(ctx.sessions.len());

    let (tx, rx) = mpsc::channel(ctx.send_queue);
    let cancel = shutdown.child_token();
    transports.insert(
        id,
        TransportHandle {
            tx,
            cancel: cancel.clone(),
        },
    );

    let span = spans::connection(&id.to_string(), &addr.ip().to_string());
    async {
        info!(%addr, tls = is_tls, "Connection accepted");
        ctx.bus.publish(SessionAdded { id }).await;

        let (reader, writer) = tokio::io::split(stream);
        let writer_task = tokio::spawn(write_loop(writer, rx, cancel.clone()).in_current_span());
        read_loop(id, reader, &ctx, &cancel).await;

        cancel.cancel();
        if let Err(e) = writer_task.await {
            warn!(error = %e, "Writer task ended abnormally");
        }

        transports.remove(&id);
        ctx.sessions.remove_session(&id);
        crate::metrics::set_connected_sessions(ctx.sessions.len());
        ctx.bus.publish(SessionRemoved { id }).await;
        info!(%addr, "Connection closed");
    }
    .instrument(span)
    .await;
}

async fn read_loop<R>(id: SessionId, reader: R, ctx: &ConnectionContext, cancel: &CancellationToken)
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LineCodec::with_max_len(ctx.max_line_length));
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = lines.next() => frame,
        };

        match frame {
            Some(Ok(Ok(line))) => handle_line(id, line, ctx).await,
            Some(Ok(Err(e))) => report_parse_failure(id, String::new(), &e, ctx).await,
            Some(Err(e)) => {
                debug!(error = %e, "Read error");
                break;
            }
            None => break,
        }
    }
}

async fn handle_line(id: SessionId, line: String, ctx: &ConnectionContext) {
    if line.trim().is_empty() {
        return;
    }
    trace!(line = %line, "Received");

    match ctx.parser.parse(&line) {
        Ok(messages) => {
            for message in messages {
                if let Err(e) = ctx.router.dispatch_message(id, message).await {
                    debug!(error = %e, "Command dispatch failed");
                }
            }
        }
        Err(e) => report_parse_failure(id, line, &e, ctx).await,
    }
}

async fn report_parse_failure(id: SessionId, line: String, error: &ProtocolError, ctx: &ConnectionContext) {
    debug!(error = %error, "Unparseable line");
    ctx.bus
        .publish(ParseFailed {
            session_id: id,
            line,
            reason: error.to_string(),
        })
        .await;
}

async fn write_loop<W>(writer: W, mut rx: mpsc::Receiver<Outbound>, cancel: CancellationToken)
where
    W: AsyncWrite + Unpin,
{
    let mut sink = FramedWrite::new(writer, LineCodec::default());
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => next,
        };
        match next {
            Some(Outbound::Data(payload)) => {
                // A peer that stops reading blocks here once the socket
                // buffer is full.
                let written = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    written = sink.send(payload) => written,
                };
                if let Err(e) = written {
                    debug!(error = %e, "Write error");
                    break;
                }
                crate::metrics::record_message_sent();
            }
            Some(Outbound::Close) | None => break,
        }
    }
    cancel.cancel();
    if tokio::time::timeout(SHUTDOWN_GRACE, sink.into_inner().shutdown())
        .await
        .is_err()
    {
        debug!("Write half shutdown timed out");
    }
}
