//! Post-accept workflow.
//!
//! Runs on [`SessionAdded`]: announce the hostname lookup, resolve the
//! peer address with a bounded wait, record the result on the session and
//! finally publish [`ClientReady`]. Readiness is published exactly once
//! whatever the lookup does, so registration never stalls on DNS.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::HandlerResult;
use crate::events::{ClientReady, SendMessage, SessionAdded, SessionRemoved};
use crate::network::HostnameResolver;
use crate::proto::Message;
use crate::signals::{SignalBus, SignalListener};
use crate::state::{Session, SessionId, SessionManager};

pub const LOOKING_UP_HOSTNAME: &str = "*** Looking up your hostname...";
pub const HOSTNAME_NOT_RESOLVED: &str = "*** Could not resolve your hostname";

pub struct ConnectionHandler {
    bus: Arc<SignalBus>,
    sessions: Arc<SessionManager>,
    resolver: Arc<dyn HostnameResolver>,
    server_name: String,
    dns_timeout: Duration,
}

impl ConnectionHandler {
    pub fn new(
        bus: Arc<SignalBus>,
        sessions: Arc<SessionManager>,
        resolver: Arc<dyn HostnameResolver>,
        server_name: impl Into<String>,
        dns_timeout: Duration,
    ) -> Self {
        Self {
            bus,
            sessions,
            resolver,
            server_name: server_name.into(),
            dns_timeout,
        }
    }

    /// Subscribe to the session lifecycle signals.
    pub fn attach(self: &Arc<Self>) {
        self.bus.subscribe::<SessionAdded, _>(Arc::clone(self));
        self.bus.subscribe::<SessionRemoved, _>(Arc::clone(self));
    }

    async fn notice(&self, session_id: SessionId, text: impl Into<String>) {
        let message = Message::notice_auth(&self.server_name, text);
        self.bus.publish(SendMessage { session_id, message }).await;
    }

    async fn resolve_hostname(&self, session: &Session) {
        let id = session.id();
        self.notice(id, LOOKING_UP_HOSTNAME).await;

        let lookup = AssertUnwindSafe(self.resolver.resolve(session.ip())).catch_unwind();
        match tokio::time::timeout(self.dns_timeout, lookup).await {
            Ok(Ok(Some(hostname))) if !hostname.is_empty() => {
                debug!(session_id = %id, %hostname, "Hostname resolved");
                self.notice(id, format!("*** Found your hostname: {hostname}")).await;
                session.set_hostname(hostname);
            }
            Ok(Ok(_)) => {
                session.set_hostname(session.ip_string());
                self.notice(id, HOSTNAME_NOT_RESOLVED).await;
            }
            Ok(Err(_)) => {
                warn!(session_id = %id, ip = %session.ip(), "Hostname resolver panicked");
                session.set_hostname(session.ip_string());
                self.notice(id, HOSTNAME_NOT_RESOLVED).await;
            }
            Err(_) => {
                warn!(session_id = %id, ip = %session.ip(), "Hostname lookup timed out");
                session.set_hostname(session.ip_string());
                self.notice(id, HOSTNAME_NOT_RESOLVED).await;
            }
        }
    }
}

#[async_trait]
impl SignalListener<SessionAdded> for ConnectionHandler {
    async fn on_signal(&self, signal: &SessionAdded) -> HandlerResult {
        match self.sessions.get_session(&signal.id) {
            Some(session) => self.resolve_hostname(&session).await,
            None => debug!(session_id = %signal.id, "Session gone before hostname lookup"),
        }
        self.bus.publish(ClientReady { id: signal.id }).await;
        Ok(())
    }
}

#[async_trait]
impl SignalListener<SessionRemoved> for ConnectionHandler {
    async fn on_signal(&self, _signal: &SessionRemoved) -> HandlerResult {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::net::IpAddr;

    struct FixedResolver(Option<&'static str>);

    #[async_trait]
    impl HostnameResolver for FixedResolver {
        async fn resolve(&self, _ip: IpAddr) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    struct StalledResolver;

    #[async_trait]
    impl HostnameResolver for StalledResolver {
        async fn resolve(&self, _ip: IpAddr) -> Option<String> {
            std::future::pending().await
        }
    }

    struct PanickingResolver;

    #[async_trait]
    impl HostnameResolver for PanickingResolver {
        async fn resolve(&self, _ip: IpAddr) -> Option<String> {
            panic!("resolver exploded")
        }
    }

    struct Outcome {
        session: Arc<Session>,
        notices: Vec<String>,
        ready: Vec<SessionId>,
    }

    async fn run(resolver: Arc<dyn HostnameResolver>, timeout: Duration) -> Outcome {
        let bus = Arc::new(SignalBus::new(2, None));
        let sessions = Arc::new(SessionManager::new());
        let handler = Arc::new(ConnectionHandler::new(
            Arc::clone(&bus),
            Arc::clone(&sessions),
            resolver,
            "irc.test",
            timeout,
        ));
        handler.attach();

        let notices = Arc::new(Mutex::new(Vec::new()));
        let ready = Arc::new(Mutex::new(Vec::new()));
        let n = Arc::clone(&notices);
        bus.subscribe_fn(move |signal: Arc<SendMessage>| {
            let n = Arc::clone(&n);
            async move {
                n.lock().push(signal.message.to_string());
                Ok(())
            }
        });
        let r = Arc::clone(&ready);
        bus.subscribe_fn(move |signal: Arc<ClientReady>| {
            let r = Arc::clone(&r);
            async move {
                r.lock().push(signal.id);
                Ok(())
            }
        });

        let session = sessions.add_session(SessionId::new(), "203.0.113.5".parse().unwrap(), false);
        bus.publish(SessionAdded { id: session.id() }).await;

        // The handler publishes follow-up signals from inside a dispatch job,
        // so wait for those before closing the bus.
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while ready.lock().is_empty() && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bus.wait_for_completion().await;

        let notices = notices.lock().clone();
        let ready = ready.lock().clone();
        Outcome {
            session,
            notices,
            ready,
        }
    }

    #[tokio::test]
    async fn resolved_hostname_is_recorded() {
        let out = run(Arc::new(FixedResolver(Some("host.example.org"))), Duration::from_secs(1)).await;

        assert_eq!(out.session.hostname().as_deref(), Some("host.example.org"));
        assert_eq!(out.ready, vec![out.session.id()]);
        assert!(out.notices.contains(&":irc.test NOTICE AUTH :*** Looking up your hostname...".to_string()));
        assert!(out.notices.contains(&":irc.test NOTICE AUTH :*** Found your hostname: host.example.org".to_string()));
    }

    #[tokio::test]
    async fn failed_lookup_falls_back_to_ip() {
        let out = run(Arc::new(FixedResolver(None)), Duration::from_secs(1)).await;

        assert_eq!(out.session.hostname().as_deref(), Some("203.0.113.5"));
        assert_eq!(out.ready, vec![out.session.id()]);
        assert!(out.notices.contains(&":irc.test NOTICE AUTH :*** Could not resolve your hostname".to_string()));
    }

    #[tokio::test]
    async fn empty_hostname_counts_as_failure() {
        let out = run(Arc::new(FixedResolver(Some(""))), Duration::from_secs(1)).await;
        assert_eq!(out.session.hostname().as_deref(), Some("203.0.113.5"));
        assert_eq!(out.ready.len(), 1);
    }

    #[tokio::test]
    async fn stalled_lookup_times_out_and_still_signals_ready() {
        let out = run(Arc::new(StalledResolver), Duration::from_millis(20)).await;
        assert_eq!(out.session.hostname().as_deref(), Some("203.0.113.5"));
        assert_eq!(out.ready, vec![out.session.id()]);
    }

    #[tokio::test]
    async fn panicking_resolver_still_signals_ready_once() {
        let out = run(Arc::new(PanickingResolver), Duration::from_secs(1)).await;
        assert_eq!(out.session.hostname().as_deref(), Some("203.0.113.5"));
        assert_eq!(out.ready, vec![out.session.id()]);
        assert!(out.notices.contains(&":irc.test NOTICE AUTH :*** Could not resolve your hostname".to_string()));
    }
}
