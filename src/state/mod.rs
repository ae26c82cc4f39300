//! State management module.
//!
//! Contains the session registry and the per-connection session type.

mod manager;
mod session;
mod uid;

pub use manager::SessionManager;
pub use session::{Session, SessionState};
pub use uid::SessionId;
