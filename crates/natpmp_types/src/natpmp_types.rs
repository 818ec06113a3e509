//! NAT-PMP Types - Shared data model for the NAT-PMP plugin
//!
//! This crate contains the configuration record exchanged between the
//! preferences page and the core plugin, the status record, and the parser
//! for `natpmpc` output.

mod config;
mod mapping;
mod status;

pub use config::*;
pub use mapping::*;
pub use status::*;
