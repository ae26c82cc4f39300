//! Session registry.
//!
//! This module contains the `SessionManager`, the single owner of every
//! live [`Session`]. It is constructed once by the server runtime and
//! handed to components by `Arc`.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::debug;

use super::session::Session;
use super::uid::SessionId;

/// Concurrency-safe map of session id to live session.
///
/// Once removed, a session id is never resolved again; callers holding an
/// `Arc<Session>` keep a detached value that no lookup will return.
///
/// Nicknames are reserved in a second map keyed by the case-folded nick,
/// so at most one live session owns any given nickname.
#[derive(Debug, Default)]
pub struct SessionManager {
    sessions: DashMap<SessionId, Arc<Session>>,
    nicknames: DashMap<String, SessionId>,
}

fn fold(nickname: &str) -> String {
    nickname.to_ascii_lowercase()
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and register a session for a freshly accepted connection.
    ///
    /// If the id is already registered the existing session is returned
    /// unchanged.
    pub fn add_session(&self, id: SessionId, ip: IpAddr, is_tls: bool) -> Arc<Session> {
        self.insert(Session::new(id, ip, is_tls))
    }

    /// Register a pre-built session.
    pub fn insert(&self, session: Session) -> Arc<Session> {
        let id = session.id();
        let entry = self.sessions.entry(id).or_insert_with(|| {
            debug!(session_id = %id, ip = %session.ip(), "Session registered");
            Arc::new(session)
        });
        Arc::clone(entry.value())
    }

    pub fn get_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn remove_session(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.remove(id).map(|(_, session)| session);
        if let Some(session) = &removed {
            if let Some(nickname) = session.nickname() {
                self.release_nickname(*id, &nickname);
            }
            debug!(session_id = %id, "Session removed");
        }
        removed
    }

    /// Atomically reserve `nickname` for `session`, releasing its previous
    /// nickname.
    ///
    /// Fails with the owner's id when another session holds the nickname.
    /// Re-claiming your own nickname, in any case, succeeds and updates the
    /// stored spelling.
    pub fn claim_nickname(&self, session: &Session, nickname: &str) -> Result<(), SessionId> {
        let id = session.id();
        let previous = session.nickname();
        let key = fold(nickname);

        match self.nicknames.entry(key.clone()) {
            Entry::Occupied(entry) if *entry.get() != id => return Err(*entry.get()),
            Entry::Occupied(_) => session.set_nickname(nickname),
            Entry::Vacant(entry) => {
                entry.insert(id);
                session.set_nickname(nickname);
            }
        }

        if let Some(previous) = previous
            && fold(&previous) != key
        {
            self.release_nickname(id, &previous);
        }

        // Removed while claiming: drop the reservation it can no longer release.
        if !self.sessions.contains_key(&id) {
            self.release_nickname(id, nickname);
        }
        Ok(())
    }

    fn release_nickname(&self, id: SessionId, nickname: &str) {
        self.nicknames.remove_if(&fold(nickname), |_, owner| *owner == id);
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Snapshot of all live sessions.
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Case-insensitive nickname lookup.
    pub fn find_by_nickname(&self, nickname: &str) -> Option<Arc<Session>> {
        let owner = *self.nicknames.get(&fold(nickname))?;
        self.get_session(&owner)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
