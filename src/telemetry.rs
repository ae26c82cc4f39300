//! Telemetry utilities for command timing and span naming.

use std::time::Instant;

/// Guard for timing command execution and recording metrics.
///
/// Records command latency when dropped.
pub struct CommandTimer {
    command: String,
    start: Instant,
}

impl CommandTimer {
    /// Start timing a command.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            start: Instant::now(),
        }
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.command, duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, info_span};

    /// Span around one transport session.
    pub fn connection(session_id: &str, ip: &str) -> Span {
        info_span!("connection", session_id = %session_id, ip = %ip)
    }

    /// Span around one router dispatch.
    pub fn command(command: &str, session_id: &str) -> Span {
        info_span!("irc.command", command = %command, session_id = %session_id)
    }

    /// Span around one scheduled job tick.
    pub fn job(name: &str) -> Span {
        info_span!("scheduler.job", job = %name)
    }
}
