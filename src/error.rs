//! Unified error handling for abyssd.
//!
//! Every component reports failures through one of the enums below. Errors
//! that cross a component boundary (bus listeners, scheduler ticks, network
//! I/O) are logged and swallowed there; only registration and startup
//! errors are returned to callers.

use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Handler Errors (bus listeners and command handlers)
// ============================================================================

/// Errors raised by a bus listener or a command handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("not enough parameters")]
    NeedMoreParams,

    #[error("no such session: {0}")]
    NoSuchSession(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl HandlerError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NeedMoreParams => "need_more_params",
            Self::NoSuchSession(_) => "no_such_session",
            Self::Internal(_) => "internal_error",
            Self::Other(_) => "other",
        }
    }
}

/// Result type for bus listeners and command handlers.
pub type HandlerResult = Result<(), HandlerError>;

// ============================================================================
// Scheduler Errors
// ============================================================================

/// Job registry errors. Fatal to the call, never to the process.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("job '{0}' is already registered")]
    AlreadyExists(String),

    #[error("job '{0}' is not registered")]
    NotFound(String),

    #[error("scheduler is shut down")]
    Closed,
}

// ============================================================================
// Router Errors
// ============================================================================

/// Command listener registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

// ============================================================================
// Network Errors (startup of the connection service)
// ============================================================================

/// Errors that abort startup of the connection service.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("certificate not found: {}", .0.display())]
    CertificateNotFound(PathBuf),

    #[error("no certificates found in {}", .0.display())]
    NoCertificates(PathBuf),

    #[error("no private keys found in {}", .0.display())]
    NoPrivateKey(PathBuf),

    #[error("private key in {} is encrypted but no password is configured", .0.display())]
    KeyPasswordRequired(PathBuf),

    #[error("failed to decrypt private key in {}: {reason}", path.display())]
    KeyDecryption { path: PathBuf, reason: String },

    #[error("tls configuration error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
