//! IRC command handling.
//!
//! The [`CommandRouter`] maps command codes to ordered listener lists and
//! republishes every command on the bus. Built-in handlers live in
//! `connection`; the post-accept workflow lives in [`ConnectionHandler`].

mod connection;
mod context;
mod lifecycle;
mod registry;
mod traits;

pub use connection::{NickHandler, PingHandler, QuitHandler, builtin_handlers};
pub use context::Context;
pub use lifecycle::{ConnectionHandler, HOSTNAME_NOT_RESOLVED, LOOKING_UP_HOSTNAME};
pub use registry::CommandRouter;
pub use traits::{CommandCallback, CommandHandler, CommandListener, HandlerDefinition};
