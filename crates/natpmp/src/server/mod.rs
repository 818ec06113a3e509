//! JSON-RPC Server
//!
//! Exposes the core's exported methods over HTTP.

mod router;
mod state;

pub use router::*;
pub use state::*;
