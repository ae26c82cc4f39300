//! abyssd - Abyss IRC Daemon
//!
//! Event-driven IRC server core: a typed signal bus connects the
//! connection service, the command router, the post-accept connection
//! handler and the scheduler.

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod network;
pub mod proto;
pub mod scheduler;
pub mod server;
pub mod signals;
pub mod state;
pub mod telemetry;

pub use server::Server;
