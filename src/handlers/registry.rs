//! Command router.
//!
//! Maps command codes to an ordered list of listeners. Unlike generic bus
//! delivery, one dispatch runs its listeners one after another in
//! registration order, because protocol handling order matters.

use dashmap::DashMap;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Instrument, debug, info, trace};

use super::context::Context;
use super::traits::{CommandCallback, CommandHandler, CommandListener, HandlerDefinition};
use crate::error::{HandlerResult, RouterError};
use crate::events::{CommandReceived, SendMessage};
use crate::proto::Message;
use crate::signals::SignalBus;
use crate::state::{SessionId, SessionManager};
use crate::telemetry::{CommandTimer, spans};

pub struct CommandRouter {
    bus: Arc<SignalBus>,
    sessions: Arc<SessionManager>,
    server_name: String,
    listeners: DashMap<String, Vec<CommandListener>>,
    definitions: Mutex<Vec<HandlerDefinition>>,
    started: AtomicBool,
}

impl CommandRouter {
    /// Create a router whose `start` activates the built-in handlers.
    pub fn new(
        bus: Arc<SignalBus>,
        sessions: Arc<SessionManager>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            bus,
            sessions,
            server_name: server_name.into(),
            listeners: DashMap::new(),
            definitions: Mutex::new(super::connection::builtin_handlers()),
            started: AtomicBool::new(false),
        }
    }

    /// Replace the set of handlers activated by `start`.
    #[must_use]
    pub fn with_definitions(self, definitions: Vec<HandlerDefinition>) -> Self {
        *self.definitions.lock() = definitions;
        self
    }

    /// Add a handler to be activated by `start`.
    pub fn define(&self, definition: HandlerDefinition) {
        self.definitions.lock().push(definition);
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn bus(&self) -> &SignalBus {
        &self.bus
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Append `handler` to the listeners of `code`.
    pub fn register_listener(
        &self,
        code: &str,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<(), RouterError> {
        self.push(code, CommandListener::Handler(handler))
    }

    /// Append a callback to the listeners of `code`.
    pub fn register_callback<F, Fut>(&self, code: &str, f: F) -> Result<(), RouterError>
    where
        F: Fn(SessionId, Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        let callback: CommandCallback = Arc::new(move |id, msg| f(id, msg).boxed());
        self.push(code, CommandListener::Callback(callback))
    }

    fn push(&self, code: &str, listener: CommandListener) -> Result<(), RouterError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(RouterError::InvalidArgument("command code must not be empty"));
        }
        let code = code.to_ascii_uppercase();
        trace!(command = %code, ?listener, "Registering command listener");
        self.listeners.entry(code).or_default().push(listener);
        Ok(())
    }

    pub fn listener_count(&self, code: &str) -> usize {
        self.listeners
            .get(&code.to_ascii_uppercase())
            .map_or(0, |entry| entry.len())
    }

    /// Activate every defined handler. Later calls are no-ops.
    pub fn start(&self) -> Result<(), RouterError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let definitions = self.definitions.lock().clone();
        for definition in &definitions {
            self.register_listener(definition.code, (definition.factory)())?;
        }
        info!(handlers = definitions.len(), "Command router started");
        Ok(())
    }

    /// Nothing to release: listeners stay registered until the router is
    /// dropped.
    pub fn stop(&self) {
        debug!("Command router stopped");
    }

    /// Publish [`CommandReceived`], then run every listener for the
    /// command's code in registration order.
    ///
    /// The first listener error stops the remaining listeners and is
    /// returned. A code with no listeners is a no-op.
    pub async fn dispatch_message(&self, session_id: SessionId, command: Message) -> HandlerResult {
        self.bus
            .publish(CommandReceived {
                session_id,
                command: command.clone(),
            })
            .await;

        let code = command.code().to_ascii_uppercase();
        let Some(listeners) = self.listeners.get(&code).map(|entry| entry.value().clone()) else {
            trace!(command = %code, "No listeners for command");
            return Ok(());
        };

        let span = spans::command(&code, &session_id.to_string());
        let _timer = CommandTimer::new(&code);
        let ctx = Context::new(session_id, self);

        async {
            for listener in &listeners {
                if let Err(e) = listener.invoke(&ctx, &command).await {
                    crate::metrics::record_command_error(&code, e.error_code());
                    debug!(error = %e, "Command handler failed");
                    return Err(e);
                }
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Publish a [`SendMessage`] for `session_id`.
    pub async fn send_message(&self, session_id: SessionId, message: Message) {
        self.bus.publish(SendMessage { session_id, message }).await;
    }

    /// Send a server NOTICE to `target` on `session_id`.
    pub async fn send_notice(
        &self,
        session_id: SessionId,
        target: impl Into<String>,
        text: impl Into<String>,
    ) {
        let notice = Message::notice(&self.server_name, target, text);
        self.send_message(session_id, notice).await;
    }
}

impl std::fmt::Debug for CommandRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRouter")
            .field("server_name", &self.server_name)
            .field("codes", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
