//! Prometheus metrics collection for abyssd.
//!
//! Every metric is a `OnceLock` static that stays empty until [`init`] runs,
//! so the `record_*` helpers are silent no-ops in unit tests and embedded
//! uses that never call it.
//!
//! - `abyss_signals_published_total{event}` - Signals fanned out by the bus
//! - `abyss_signal_dispatch_failures_total{event,error}` - Listener failures
//! - `irc_command_total{command}` / `irc_command_duration_seconds{command}`
//! - `abyss_scheduler_ticks_total{job}` / `abyss_scheduler_failures_total{job}`

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Signal bus
// ========================================================================

/// Signals published with at least one listener, by signal type.
pub static SIGNALS_PUBLISHED: OnceLock<IntCounterVec> = OnceLock::new();

/// Listener errors and panics caught by the dispatch pool.
pub static SIGNAL_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// IRC traffic
// ========================================================================

/// Commands processed by type (PING, NICK, PRIVMSG, ...).
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command processing latency by command type.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Command errors by type and error kind.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Total outbound writes handed to a live session.
pub static MESSAGES_SENT: OnceLock<IntCounter> = OnceLock::new();

/// Currently connected sessions.
pub static CONNECTED_SESSIONS: OnceLock<IntGauge> = OnceLock::new();

/// Sessions dropped because their outbound queue filled up.
pub static SENDQ_EXCEEDED: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Scheduler
// ========================================================================

pub static SCHEDULER_TICKS: OnceLock<IntCounterVec> = OnceLock::new();

pub static SCHEDULER_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(metric = stringify!($metric), error = %e, "Failed to register metric");
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::error!(metric = stringify!($metric), error = %e, "Failed to create metric");
                }
            }
        };
    }

    register!(SIGNALS_PUBLISHED, IntCounterVec::new(Opts::new("abyss_signals_published_total", "Signals published by type"), &["event"]));
    register!(SIGNAL_FAILURES, IntCounterVec::new(Opts::new("abyss_signal_dispatch_failures_total", "Signal listener failures"), &["event", "error"]));

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("irc_command_total", "IRC commands processed by type"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("irc_command_duration_seconds", "IRC command latency by type")
            .buckets(vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("irc_command_errors_total", "IRC command errors by type"), &["command", "error"]));
    register!(MESSAGES_SENT, IntCounter::new("irc_messages_sent_total", "Total messages sent"));
    register!(CONNECTED_SESSIONS, IntGauge::new("irc_connected_sessions", "Currently connected sessions"));
    register!(SENDQ_EXCEEDED, IntCounter::new("irc_sendq_exceeded_total", "Sessions dropped for a full outbound queue"));

    register!(SCHEDULER_TICKS, IntCounterVec::new(Opts::new("abyss_scheduler_ticks_total", "Scheduled job executions"), &["job"]));
    register!(SCHEDULER_FAILURES, IntCounterVec::new(Opts::new("abyss_scheduler_failures_total", "Scheduled job failures"), &["job"]));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

#[inline]
pub fn record_signal_published(event: &str) {
    if let Some(c) = SIGNALS_PUBLISHED.get() {
        c.with_label_values(&[event]).inc();
    }
}

#[inline]
pub fn record_signal_failure(event: &str, error: &str) {
    if let Some(c) = SIGNAL_FAILURES.get() {
        c.with_label_values(&[event, error]).inc();
    }
}

/// Record a command execution with latency.
#[inline]
pub fn record_command(command: &str, duration_secs: f64) {
    if let Some(c) = COMMAND_COUNTER.get() {
        c.with_label_values(&[command]).inc();
    }
    if let Some(h) = COMMAND_LATENCY.get() {
        h.with_label_values(&[command]).observe(duration_secs);
    }
}

/// Record a command error.
#[inline]
pub fn record_command_error(command: &str, error: &str) {
    if let Some(c) = COMMAND_ERRORS.get() {
        c.with_label_values(&[command, error]).inc();
    }
}

#[inline]
pub fn record_message_sent() {
    if let Some(c) = MESSAGES_SENT.get() {
        c.inc();
    }
}

#[inline]
pub fn set_connected_sessions(count: usize) {
    if let Some(g) = CONNECTED_SESSIONS.get() {
        g.set(i64::try_from(count).unwrap_or(i64::MAX));
    }
}

#[inline]
pub fn record_sendq_exceeded() {
    if let Some(c) = SENDQ_EXCEEDED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_job_tick(job: &str) {
    if let Some(c) = SCHEDULER_TICKS.get() {
        c.with_label_values(&[job]).inc();
    }
}

#[inline]
pub fn record_job_failure(job: &str) {
    if let Some(c) = SCHEDULER_FAILURES.get() {
        c.with_label_values(&[job]).inc();
    }
}
