//! PING handler.

use async_trait::async_trait;

use crate::error::HandlerResult;
use crate::handlers::{CommandHandler, Context};
use crate::proto::Message;

/// Replies to `PING <token>` with `:<server> PONG <server> <token>`. The
/// trailing colon only appears when the token needs it.
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        let Some(token) = msg.arg(0) else {
            ctx.send_numeric("409", &["No origin specified"]).await;
            return Ok(());
        };

        ctx.reply(Message::pong(ctx.server_name(), Some(token))).await;
        Ok(())
    }
}
