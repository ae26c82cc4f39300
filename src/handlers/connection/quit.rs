//! QUIT handler for terminating client sessions.

use async_trait::async_trait;
use tracing::info;

use crate::error::HandlerResult;
use crate::events::DisconnectRequested;
use crate::handlers::{CommandHandler, Context};
use crate::proto::Message;

/// Handler for QUIT command.
///
/// Asks the connection service to close the link after an
/// `ERROR :Closing Link` line.
pub struct QuitHandler;

#[async_trait]
impl CommandHandler for QuitHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        let reason = msg.arg(0).unwrap_or("Client Quit").to_string();
        let host = ctx
            .session()
            .map(|s| s.hostname().unwrap_or_else(|| s.ip_string()))
            .unwrap_or_else(|| "*".to_string());

        info!(
            session_id = %ctx.session_id,
            nick = %ctx.nick_or_star(),
            reason = %reason,
            "Client quit"
        );

        let farewell = Message::error(format!("Closing Link: {host} ({reason})"));
        ctx.bus()
            .publish(DisconnectRequested {
                session_id: ctx.session_id,
                reason,
                farewell: Some(farewell),
            })
            .await;
        Ok(())
    }
}
