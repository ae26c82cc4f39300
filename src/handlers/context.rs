//! Command handler context.

use std::sync::Arc;

use super::registry::CommandRouter;
use crate::proto::Message;
use crate::signals::SignalBus;
use crate::state::{Session, SessionId, SessionManager};

/// Handler context passed to each command handler.
///
/// Borrowed from the router for the duration of one dispatch.
pub struct Context<'a> {
    /// The session the command arrived on.
    pub session_id: SessionId,
    router: &'a CommandRouter,
}

impl<'a> Context<'a> {
    pub(crate) fn new(session_id: SessionId, router: &'a CommandRouter) -> Self {
        Self { session_id, router }
    }

    /// Server name used as the prefix of server-originated replies.
    #[inline]
    pub fn server_name(&self) -> &str {
        self.router.server_name()
    }

    pub fn bus(&self) -> &SignalBus {
        self.router.bus()
    }

    pub fn sessions(&self) -> &SessionManager {
        self.router.sessions()
    }

    /// The live session, if it has not disconnected meanwhile.
    pub fn session(&self) -> Option<Arc<Session>> {
        self.sessions().get_session(&self.session_id)
    }

    /// Nickname of the session or `*` before registration.
    pub fn nick_or_star(&self) -> String {
        self.session()
            .and_then(|s| s.nickname())
            .unwrap_or_else(|| "*".to_string())
    }

    /// Send a message back to this session.
    pub async fn reply(&self, message: Message) {
        self.router.send_message(self.session_id, message).await;
    }

    /// Send a numeric reply `:<server> <numeric> <nick> <params...>`.
    pub async fn send_numeric(&self, numeric: &str, params: &[&str]) {
        let mut all = vec![self.nick_or_star()];
        all.extend(params.iter().map(|p| p.to_string()));
        let reply = Message::new(numeric, all).with_prefix(self.server_name());
        self.reply(reply).await;
    }
}
