//! Plugin Registry
//!
//! Plugins are registered explicitly at startup by calling
//! [`PluginRegistry::register_plugin`]. Registration does not enable a plugin;
//! the host enables and disables plugins by name, which drives the plugin's
//! `on_enable`/`on_disable` hooks.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::{HostError, HostResult};
use crate::preferences::Preferences;
use crate::rpc::RpcClient;

// ─────────────────────────────────────────────────────────────────────────────
// Host Context
// ─────────────────────────────────────────────────────────────────────────────

/// The host services a plugin may use from its lifecycle hooks
#[derive(Clone)]
pub struct HostContext {
    preferences: Arc<Preferences>,
    client: Arc<dyn RpcClient>,
}

impl HostContext {
    pub fn new(preferences: Arc<Preferences>, client: Arc<dyn RpcClient>) -> Self {
        Self {
            preferences,
            client,
        }
    }

    /// The preferences window
    pub fn preferences(&self) -> &Arc<Preferences> {
        &self.preferences
    }

    /// Client connected to the core
    pub fn client(&self) -> Arc<dyn RpcClient> {
        Arc::clone(&self.client)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A client-side plugin
pub trait Plugin: Send + Sync + 'static {
    /// Registered plugin name
    fn name(&self) -> &str;

    /// Called when the plugin is enabled
    fn on_enable(&mut self, host: &HostContext) -> HostResult<()>;

    /// Called when the plugin is disabled
    fn on_disable(&mut self, host: &HostContext) -> HostResult<()>;
}

struct PluginEntry {
    plugin: Box<dyn Plugin>,
    enabled: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Plugin Registry
// ─────────────────────────────────────────────────────────────────────────────

/// All plugins known to the host, indexed by name
pub struct PluginRegistry {
    host: HostContext,
    plugins: DashMap<String, PluginEntry>,
}

impl PluginRegistry {
    pub fn new(host: HostContext) -> Self {
        Self {
            host,
            plugins: DashMap::new(),
        }
    }

    /// The context handed to plugin hooks
    pub fn host(&self) -> &HostContext {
        &self.host
    }

    /// Register a plugin under its name
    pub fn register_plugin<P: Plugin>(&self, plugin: P) -> HostResult<()> {
        let name = plugin.name().to_string();

        if self.plugins.contains_key(&name) {
            return Err(HostError::PluginExists(name));
        }

        self.plugins.insert(
            name.clone(),
            PluginEntry {
                plugin: Box::new(plugin),
                enabled: false,
            },
        );
        tracing::info!(plugin = %name, "Registered plugin");
        Ok(())
    }

    /// Enable a plugin; enabling an enabled plugin is a no-op
    pub fn enable(&self, name: &str) -> HostResult<()> {
        let mut entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| HostError::PluginNotFound(name.to_string()))?;

        if entry.enabled {
            return Ok(());
        }

        entry.plugin.on_enable(&self.host)?;
        entry.enabled = true;
        tracing::info!(plugin = name, "Enabled plugin");
        Ok(())
    }

    /// Disable a plugin; disabling a disabled plugin is a no-op
    pub fn disable(&self, name: &str) -> HostResult<()> {
        let mut entry = self
            .plugins
            .get_mut(name)
            .ok_or_else(|| HostError::PluginNotFound(name.to_string()))?;

        if !entry.enabled {
            return Ok(());
        }

        entry.plugin.on_disable(&self.host)?;
        entry.enabled = false;
        tracing::info!(plugin = name, "Disabled plugin");
        Ok(())
    }

    /// Disable every enabled plugin
    pub fn disable_all(&self) {
        for name in self.names() {
            if let Err(e) = self.disable(&name) {
                tracing::warn!(plugin = %name, error = %e, "Failed to disable plugin");
            }
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.plugins.get(name).map(|e| e.enabled).unwrap_or(false)
    }

    /// Names of all registered plugins, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.plugins.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
