//! Per-connection session state.
//!
//! A [`Session`] is created by the connection service on accept and shared
//! (via `Arc`) with every component that needs it. Identity fields are
//! immutable; protocol-level fields sit behind a `parking_lot::RwLock` so
//! the lock is never held across an `.await`.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;

use super::uid::SessionId;

/// Mutable protocol-level state of a session.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    /// Resolved hostname; `None` until the post-accept lookup finishes.
    pub hostname: Option<String>,
    /// Nickname; `None` until NICK is accepted.
    pub nickname: Option<String>,
    /// Free-form state owned by higher protocol layers.
    pub attributes: HashMap<String, String>,
}

/// A single client's logical connection.
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    ip: IpAddr,
    is_tls: bool,
    connected_at: DateTime<Utc>,
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new(id: SessionId, ip: IpAddr, is_tls: bool) -> Self {
        Self {
            id,
            ip,
            is_tls,
            connected_at: Utc::now(),
            state: RwLock::new(SessionState::default()),
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[inline]
    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    /// Remote address in its textual form, used as the fallback hostname.
    pub fn ip_string(&self) -> String {
        self.ip.to_string()
    }

    #[inline]
    pub fn is_tls(&self) -> bool {
        self.is_tls
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    pub fn hostname(&self) -> Option<String> {
        self.state.read().hostname.clone()
    }

    pub fn set_hostname(&self, hostname: impl Into<String>) {
        self.state.write().hostname = Some(hostname.into());
    }

    pub fn nickname(&self) -> Option<String> {
        self.state.read().nickname.clone()
    }

    /// Record the nickname. Callers outside the registry go through
    /// [`SessionManager::claim_nickname`](super::SessionManager::claim_nickname),
    /// which keeps nicknames unique.
    pub(crate) fn set_nickname(&self, nickname: impl Into<String>) {
        self.state.write().nickname = Some(nickname.into());
    }

    pub fn attribute(&self, key: &str) -> Option<String> {
        self.state.read().attributes.get(key).cloned()
    }

    pub fn set_attribute(&self, key: impl Into<String>, value: impl Into<String>) {
        self.state.write().attributes.insert(key.into(), value.into());
    }

    /// Clone of the whole mutable state.
    pub fn snapshot(&self) -> SessionState {
        self.state.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_has_no_hostname_or_nick() {
        let s = Session::new(SessionId::new(), "10.0.0.1".parse().unwrap(), false);
        assert!(s.hostname().is_none());
        assert!(s.nickname().is_none());
        assert_eq!(s.ip_string(), "10.0.0.1");
    }

    #[test]
    fn setters_are_visible_through_shared_reference() {
        let s = std::sync::Arc::new(Session::new(
            SessionId::new(),
            "::1".parse().unwrap(),
            true,
        ));
        let other = std::sync::Arc::clone(&s);
        other.set_hostname("localhost");
        other.set_nickname("alice");
        other.set_attribute("cap", "302");

        assert_eq!(s.hostname().as_deref(), Some("localhost"));
        assert_eq!(s.nickname().as_deref(), Some("alice"));
        assert_eq!(s.attribute("cap").as_deref(), Some("302"));
        assert!(s.is_tls());
    }
}
