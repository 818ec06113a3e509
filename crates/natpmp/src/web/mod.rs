//! Web UI
//!
//! The client half of the plugin: a preferences page bound to the core's
//! configuration, and the plugin object that adds it to the host.

mod page;
mod plugin;
mod widgets;

pub use page::*;
pub use plugin::*;
pub use widgets::*;

use plugin_host::{HostResult, PluginRegistry};

/// Name the plugin is registered under
pub const PLUGIN_NAME: &str = "NAT-PMP";

/// Register the NAT-PMP plugin with the host
pub fn register(registry: &PluginRegistry) -> HostResult<()> {
    registry.register_plugin(NatPmpPlugin::new())
}
