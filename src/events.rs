//! Signals exchanged over the bus.
//!
//! Each record is an immutable value; its type is the routing key. The
//! connection service publishes the session lifecycle, the router publishes
//! every command it sees, and anything that wants to talk back to a client
//! publishes [`SendMessage`].

use std::fmt;
use std::time::Duration;

use crate::proto::Message;
use crate::scheduler::JobAction;
use crate::signals::Signal;
use crate::state::SessionId;

/// A connection was accepted and its session registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionAdded {
    pub id: SessionId,
}

/// A connection ended and its session was removed from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRemoved {
    pub id: SessionId,
}

/// The post-accept workflow finished (hostname resolved or fallen back).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientReady {
    pub id: SessionId,
}

/// The router received a command, published before any handler runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReceived {
    pub session_id: SessionId,
    pub command: Message,
}

/// Write one message to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub session_id: SessionId,
    pub message: Message,
}

/// The parser rejected an inbound line. The connection keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailed {
    pub session_id: SessionId,
    pub line: String,
    pub reason: String,
}

/// Ask the connection service to drop a session.
///
/// `farewell` is written after everything already queued for the session
/// and before the socket closes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisconnectRequested {
    pub session_id: SessionId,
    pub reason: String,
    pub farewell: Option<Message>,
}

/// Register a recurring job without a reference to the scheduler.
#[derive(Clone)]
pub struct AddSchedulerJob {
    pub name: String,
    pub interval: Duration,
    pub action: JobAction,
}

impl fmt::Debug for AddSchedulerJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddSchedulerJob")
            .field("name", &self.name)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl Signal for SessionAdded {}
impl Signal for SessionRemoved {}
impl Signal for ClientReady {}
impl Signal for CommandReceived {}
impl Signal for SendMessage {}
impl Signal for ParseFailed {}
impl Signal for DisconnectRequested {}
impl Signal for AddSchedulerJob {}
