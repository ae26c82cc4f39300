//! Parser seam between raw transport lines and routed commands.

use super::error::Result;
use super::message::Message;

/// Turns raw text into zero or more commands.
///
/// A failure applies to the line(s) passed in only; callers keep reading
/// from the transport afterwards.
pub trait CommandParser: Send + Sync {
    fn parse(&self, raw: &str) -> Result<Vec<Message>>;
}

/// Default RFC 1459 line parser.
///
/// Accepts one or more newline-separated lines; blank lines produce nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct IrcParser;

impl CommandParser for IrcParser {
    fn parse(&self, raw: &str) -> Result<Vec<Message>> {
        raw.split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.parse::<Message>())
            .collect()
    }
}
