//! Configuration loading and management.
//!
//! - [`types`]: config struct definitions and the port list parser
//! - [`defaults`]: serde default functions

mod defaults;
mod types;

pub use types::{
    Config, ConfigError, NetworkConfig, ServerConfig, SignalsConfig, parse_port_list,
};
