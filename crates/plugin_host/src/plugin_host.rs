//! Plugin Host - The host-application surface a client plugin binds to
//!
//! This crate provides the pieces of a torrent-client host that plugins
//! interact with:
//! - `rpc`: the remote-call client trait and JSON-RPC wire types
//! - `preferences`: the settings window page container
//! - `plugin`: plugin lifecycle and explicit registration
//! - `service`: long-running core services with periodic ticks

mod error;
mod plugin;
mod preferences;
mod rpc;

pub mod service;

pub use error::*;
pub use plugin::*;
pub use preferences::*;
pub use rpc::*;
