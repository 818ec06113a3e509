//! NAT-PMP - Port mapping plugin for a torrent client
//!
//! This crate provides both halves of the plugin:
//! - `daemon`: configuration store, natpmpc driver and refresh timer, exported
//!   over RPC as `natpmp.*` methods
//! - `web`: the preferences page view-model and the plugin object that
//!   registers it with the host
//! - `client`: typed wrapper over the host RPC client
//! - `server`: HTTP JSON-RPC endpoint for the exported methods

mod error;

pub mod client;
pub mod daemon;
pub mod server;
pub mod settings;
pub mod web;

pub use error::{Error, Result};
