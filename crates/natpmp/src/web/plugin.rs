//! NAT-PMP Client Plugin

use std::sync::Arc;

use plugin_host::{HostContext, HostResult, Plugin, PreferencesPage};

use super::page::NatPmpPage;
use super::PLUGIN_NAME;
use crate::client::NatPmpClient;

/// Adds the NAT-PMP page to the preferences window while enabled
#[derive(Default)]
pub struct NatPmpPlugin {
    prefs_page: Option<Arc<NatPmpPage>>,
}

impl NatPmpPlugin {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered page, if the plugin is enabled
    pub fn prefs_page(&self) -> Option<&Arc<NatPmpPage>> {
        self.prefs_page.as_ref()
    }
}

impl Plugin for NatPmpPlugin {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    fn on_enable(&mut self, host: &HostContext) -> HostResult<()> {
        if self.prefs_page.is_some() {
            return Ok(());
        }

        let page = Arc::new(NatPmpPage::new(NatPmpClient::new(host.client())));
        host.preferences().add_page(page.clone())?;

        self.prefs_page = Some(page);
        Ok(())
    }

    fn on_disable(&mut self, host: &HostContext) -> HostResult<()> {
        if let Some(page) = self.prefs_page.take() {
            host.preferences().remove_page(page.title())?;
        }
        Ok(())
    }
}
