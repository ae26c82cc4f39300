//! Protocol-level parse errors.

use thiserror::Error;

/// Convenience type alias for Results using [`ProtocolError`].
pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Reasons a raw line could not be turned into a [`Message`](super::Message).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ProtocolError {
    /// The line was empty after stripping the terminator.
    #[error("empty message")]
    EmptyMessage,

    /// A prefix or tag block was present but no command followed it.
    #[error("missing command")]
    MissingCommand,

    /// The command token is neither a verb nor a three-digit numeric.
    #[error("invalid command: {0}")]
    InvalidCommand(String),

    /// The line exceeded the configured maximum length and was discarded.
    #[error("line exceeds {limit} bytes")]
    LineTooLong { limit: usize },
}
