//! Connection-level command handlers activated at router start.
//!
//! Handles PING, QUIT and NICK.

mod nick;
mod ping;
mod quit;

pub use nick::NickHandler;
pub use ping::PingHandler;
pub use quit::QuitHandler;

use std::sync::Arc;

use super::traits::HandlerDefinition;

/// Handlers every router activates unless told otherwise.
pub fn builtin_handlers() -> Vec<HandlerDefinition> {
    vec![
        HandlerDefinition {
            code: "PING",
            factory: || Arc::new(PingHandler),
        },
        HandlerDefinition {
            code: "QUIT",
            factory: || Arc::new(QuitHandler),
        },
        HandlerDefinition {
            code: "NICK",
            factory: || Arc::new(NickHandler),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DisconnectRequested, SendMessage};
    use crate::handlers::CommandRouter;
    use crate::proto::Message;
    use crate::signals::SignalBus;
    use crate::state::{SessionId, SessionManager};
    use parking_lot::Mutex;

    struct Harness {
        bus: Arc<SignalBus>,
        sessions: Arc<SessionManager>,
        router: CommandRouter,
        sent: Arc<Mutex<Vec<(SessionId, String)>>>,
    }

    fn harness() -> Harness {
        let bus = Arc::new(SignalBus::new(1, None));
        let sessions = Arc::new(SessionManager::new());
        let router = CommandRouter::new(Arc::clone(&bus), Arc::clone(&sessions), "irc.test");
        router.start().unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&sent);
        bus.subscribe_fn(move |signal: Arc<SendMessage>| {
            let s = Arc::clone(&s);
            async move {
                s.lock().push((signal.session_id, signal.message.to_string()));
                Ok(())
            }
        });
        Harness {
            bus,
            sessions,
            router,
            sent,
        }
    }

    fn parse(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let h = harness();
        let id = SessionId::new();
        h.router.dispatch_message(id, parse("PING :abc123")).await.unwrap();
        h.bus.wait_for_completion().await;

        assert_eq!(
            *h.sent.lock(),
            vec![(id, ":irc.test PONG irc.test abc123".to_string())]
        );
    }

    #[tokio::test]
    async fn ping_without_token_gets_no_origin() {
        let h = harness();
        let id = SessionId::new();
        h.router.dispatch_message(id, parse("PING")).await.unwrap();
        h.bus.wait_for_completion().await;

        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.starts_with(":irc.test 409 *"));
    }

    #[tokio::test]
    async fn nick_sets_nickname_and_detects_collisions() {
        let h = harness();
        let alice = h.sessions.add_session(SessionId::new(), "192.0.2.1".parse().unwrap(), false);
        let other = h.sessions.add_session(SessionId::new(), "192.0.2.2".parse().unwrap(), false);

        h.router.dispatch_message(alice.id(), parse("NICK alice")).await.unwrap();
        assert_eq!(alice.nickname().as_deref(), Some("alice"));

        h.router.dispatch_message(other.id(), parse("NICK ALICE")).await.unwrap();
        assert!(other.nickname().is_none());

        // Re-sending your own nick is not a collision.
        h.router.dispatch_message(alice.id(), parse("NICK Alice")).await.unwrap();
        assert_eq!(alice.nickname().as_deref(), Some("Alice"));

        h.bus.wait_for_completion().await;
        let sent = h.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, other.id());
        assert!(sent[0].1.contains(" 433 * ALICE :Nickname is already in use"));
    }

    #[tokio::test]
    async fn nick_for_vanished_session_fails() {
        let h = harness();
        let result = h.router.dispatch_message(SessionId::new(), parse("NICK ghost")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn quit_requests_disconnect_with_farewell() {
        let h = harness();
        let session = h.sessions.add_session(SessionId::new(), "192.0.2.9".parse().unwrap(), false);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let r = Arc::clone(&requests);
        h.bus.subscribe_fn(move |signal: Arc<DisconnectRequested>| {
            let r = Arc::clone(&r);
            async move {
                r.lock().push((*signal).clone());
                Ok(())
            }
        });

        h.router.dispatch_message(session.id(), parse("QUIT :gone fishing")).await.unwrap();
        h.bus.wait_for_completion().await;

        let requests = requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id, session.id());
        assert_eq!(requests[0].reason, "gone fishing");
        assert_eq!(
            requests[0].farewell.as_ref().map(ToString::to_string).as_deref(),
            Some("ERROR :Closing Link: 192.0.2.9 (gone fishing)")
        );
    }
}
