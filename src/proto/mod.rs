//! Wire protocol seam.
//!
//! The core treats parsing as an external collaborator: the connection
//! service only sees [`CommandParser`] and owned [`Message`] values. The
//! implementations here are minimal RFC 1459 implementations.

mod error;
mod line;
mod message;
mod parser;

pub use error::ProtocolError;
pub use line::{DEFAULT_MAX_LINE_LENGTH, LineCodec};
pub use message::Message;
pub use parser::{CommandParser, IrcParser};

/// Protocol line terminator.
pub const CRLF: &str = "\r\n";
