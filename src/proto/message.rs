//! Owned IRC message representation.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use super::error::{ProtocolError, Result};

/// An owned IRC message.
///
/// Tags are accepted on input and discarded; the server does not negotiate
/// IRCv3 capabilities.
///
/// # Example
///
/// ```
/// use abyssd::proto::Message;
///
/// let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
/// assert_eq!(msg.code(), "PRIVMSG");
/// assert_eq!(msg.arg(1), Some("Hello!"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Message source (`server.name` or `nick!user@host`).
    pub prefix: Option<String>,
    /// Upper-cased verb or three-digit numeric.
    pub command: String,
    /// Parameters, the last of which may contain spaces.
    pub params: Vec<String>,
}

impl Message {
    /// Create a message without a prefix.
    pub fn new<C, I, P>(command: C, params: I) -> Self
    where
        C: Into<String>,
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            prefix: None,
            command: command.into().to_ascii_uppercase(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Attach a source prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// The routing key used by the command router.
    #[inline]
    pub fn code(&self) -> &str {
        &self.command
    }

    /// Get the nth parameter.
    #[inline]
    pub fn arg(&self, n: usize) -> Option<&str> {
        self.params.get(n).map(String::as_str)
    }

    /// `:<server> NOTICE AUTH :<text>`, sent before the client has a nickname.
    pub fn notice_auth(server: &str, text: impl Into<String>) -> Self {
        Self::new("NOTICE", ["AUTH".to_string(), text.into()]).with_prefix(server)
    }

    /// `:<server> NOTICE <target> :<text>`.
    pub fn notice(server: &str, target: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new("NOTICE", [target.into(), text.into()]).with_prefix(server)
    }

    /// `:<server> PONG <server> [:<token>]`.
    pub fn pong(server: &str, token: Option<&str>) -> Self {
        let mut params = vec![server.to_string()];
        params.extend(token.map(str::to_string));
        Self::new("PONG", params).with_prefix(server)
    }

    /// `ERROR :<text>`.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new("ERROR", [text.into()])
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(raw: &str) -> Result<Self> {
        let mut rest = raw.trim_end_matches(['\r', '\n']).trim_start_matches(' ');
        if rest.is_empty() {
            return Err(ProtocolError::EmptyMessage);
        }

        if rest.starts_with('@') {
            rest = split_token(rest).1;
        }

        let mut prefix = None;
        if let Some(stripped) = rest.strip_prefix(':') {
            let (source, tail) = split_token(stripped);
            prefix = Some(source.to_string());
            rest = tail;
        }

        let (command, mut rest) = split_token(rest);
        if command.is_empty() {
            return Err(ProtocolError::MissingCommand);
        }
        let is_verb = command.chars().all(|c| c.is_ascii_alphabetic());
        let is_numeric = command.len() == 3 && command.chars().all(|c| c.is_ascii_digit());
        if !is_verb && !is_numeric {
            return Err(ProtocolError::InvalidCommand(command.to_string()));
        }

        let mut params = Vec::new();
        while !rest.is_empty() {
            if let Some(trailing) = rest.strip_prefix(':') {
                params.push(trailing.to_string());
                break;
            }
            let (param, tail) = split_token(rest);
            params.push(param.to_string());
            rest = tail;
        }

        Ok(Self {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
        })
    }
}

/// Split at the first space, skipping any run of spaces that follows.
fn split_token(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((head, tail)) => (head, tail.trim_start_matches(' ')),
        None => (s, ""),
    }
}

impl Display for Message {
    /// Wire form without the CRLF terminator; framing is the sender's job.
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        write!(f, "{}", self.command)?;

        let last = self.params.len().saturating_sub(1);
        for (i, param) in self.params.iter().enumerate() {
            let needs_colon =
                i == last && (param.is_empty() || param.contains(' ') || param.starts_with(':'));
            if needs_colon {
                write!(f, " :{}", param)?;
            } else {
                write!(f, " {}", param)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_prefix_command_and_trailing() {
        let msg: Message = ":nick!u@h PRIVMSG #chan :hello world\r\n".parse().unwrap();
        assert_eq!(msg.prefix.as_deref(), Some("nick!u@h"));
        assert_eq!(msg.code(), "PRIVMSG");
        assert_eq!(msg.params, vec!["#chan", "hello world"]);
    }

    #[test]
    fn command_is_uppercased() {
        let msg: Message = "ping :token".parse().unwrap();
        assert_eq!(msg.code(), "PING");
        assert_eq!(msg.arg(0), Some("token"));
    }

    #[test]
    fn tags_are_skipped() {
        let msg: Message = "@label=abc;time=now NICK alice".parse().unwrap();
        assert_eq!(msg.code(), "NICK");
        assert_eq!(msg.arg(0), Some("alice"));
    }

    #[test]
    fn numeric_commands_are_accepted() {
        let msg: Message = ":irc.example.net 001 alice :Welcome".parse().unwrap();
        assert_eq!(msg.code(), "001");
    }

    #[test]
    fn rejects_empty_and_bad_lines() {
        assert_eq!("\r\n".parse::<Message>(), Err(ProtocolError::EmptyMessage));
        assert_eq!(":only.prefix".parse::<Message>(), Err(ProtocolError::MissingCommand));
        assert_eq!(
            "PR1VMSG x".parse::<Message>(),
            Err(ProtocolError::InvalidCommand("PR1VMSG".into()))
        );
    }

    #[test]
    fn display_colon_prefixes_only_when_needed() {
        let msg = Message::notice_auth("irc.example.net", "*** Looking up your hostname...");
        assert_eq!(
            msg.to_string(),
            ":irc.example.net NOTICE AUTH :*** Looking up your hostname..."
        );
        assert_eq!(Message::new("NICK", ["alice"]).to_string(), "NICK alice");
        assert_eq!(Message::new("TOPIC", ["#c", ""]).to_string(), "TOPIC #c :");
    }

    #[test]
    fn pong_echoes_token() {
        assert_eq!(
            Message::pong("srv", Some("abc")).to_string(),
            ":srv PONG srv abc"
        );
        assert_eq!(Message::pong("srv", None).to_string(), ":srv PONG srv");
    }
}
