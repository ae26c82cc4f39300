//! NICK handler.

use async_trait::async_trait;
use tracing::debug;

use crate::error::{HandlerError, HandlerResult};
use crate::handlers::{CommandHandler, Context};
use crate::proto::Message;

/// Validates an IRC nickname per RFC 2812.
/// First char: letter or special [\]^_`{|}
/// Rest: letter, digit, special, or hyphen
fn is_valid_nick(nick: &str) -> bool {
    if nick.len() > 30 {
        return false;
    }

    let is_special = |c: char| matches!(c, '[' | ']' | '\\' | '`' | '_' | '^' | '{' | '|' | '}');

    let mut chars = nick.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !first.is_ascii_alphabetic() && !is_special(first) {
        return false;
    }

    chars.all(|c| c.is_ascii_alphanumeric() || is_special(c) || c == '-')
}

/// Records the nickname on the session.
pub struct NickHandler;

#[async_trait]
impl CommandHandler for NickHandler {
    async fn handle(&self, ctx: &Context<'_>, msg: &Message) -> HandlerResult {
        let Some(nick) = msg.arg(0).filter(|n| !n.is_empty()) else {
            ctx.send_numeric("431", &["No nickname given"]).await;
            return Ok(());
        };

        if !is_valid_nick(nick) {
            ctx.send_numeric("432", &[nick, "Erroneous nickname"]).await;
            return Ok(());
        }

        let session = ctx
            .session()
            .ok_or_else(|| HandlerError::NoSuchSession(ctx.session_id.to_string()))?;

        let old = session.nickname();
        if ctx.sessions().claim_nickname(&session, nick).is_err() {
            ctx.send_numeric("433", &[nick, "Nickname is already in use"]).await;
            return Ok(());
        }

        debug!(session_id = %ctx.session_id, ?old, new = %nick, "Nickname set");
        Ok(())
    }
}
