//! Command handler seams.
//!
//! A command listener is either a handler object or a plain callback; the
//! router only ever calls [`CommandListener::invoke`].

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

use super::context::Context;
use crate::error::HandlerResult;
use crate::proto::Message;
use crate::state::SessionId;

/// Handler for one or more command codes.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult;
}

/// Closure form of a command listener.
pub type CommandCallback =
    Arc<dyn Fn(SessionId, Message) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

#[derive(Clone)]
pub enum CommandListener {
    Handler(Arc<dyn CommandHandler>),
    Callback(CommandCallback),
}

impl CommandListener {
    pub async fn invoke(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        match self {
            Self::Handler(handler) => handler.handle(ctx, msg).await,
            Self::Callback(callback) => callback(ctx.session_id, msg.clone()).await,
        }
    }
}

impl fmt::Debug for CommandListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("CommandListener::Handler"),
            Self::Callback(_) => f.write_str("CommandListener::Callback"),
        }
    }
}

/// A handler activated when the router starts.
#[derive(Clone, Copy)]
pub struct HandlerDefinition {
    pub code: &'static str,
    pub factory: fn() -> Arc<dyn CommandHandler>,
}

impl fmt::Debug for HandlerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDefinition")
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}
