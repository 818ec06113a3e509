//! NAT-PMP Preferences Page
//!
//! Binds the form widgets to the core's configuration: the record is fetched
//! when the page is shown and submitted whole when the user applies.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, info};

use natpmp_types::{ConfigKey, NatPmpConfig, NatPmpStatus};
use plugin_host::{HostError, HostResult, PreferencesPage};

use super::widgets::{Checkbox, Label, SpinnerField, TextField};
use crate::client::NatPmpClient;
use crate::error::{Error, Result};

/// Title of the page in the preferences window
pub const PAGE_TITLE: &str = "NAT-PMP";

// ─────────────────────────────────────────────────────────────────────────────
// Form
// ─────────────────────────────────────────────────────────────────────────────

/// The widgets on the page, one per config key plus the status labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NatPmpForm {
    pub enabled: Checkbox,
    pub exec_path: TextField,
    pub timeout: SpinnerField,
    pub gateway_address: TextField,
    pub preffered_public_port: SpinnerField,
    pub preffered_private_port: SpinnerField,
    pub refresh_interval: SpinnerField,
    pub lifetime_interval: SpinnerField,
    pub portchange_command: TextField,

    pub last_update: Label,
    pub public_ip_address: Label,
    pub current_port: Label,
}

impl Default for NatPmpForm {
    fn default() -> Self {
        let mut form = Self {
            enabled: Checkbox::new("Enable NAT-PMP"),
            exec_path: TextField::new("natpmpc executable:"),
            timeout: SpinnerField::new(ConfigKey::Timeout, "Timeout (s):"),
            gateway_address: TextField::new("Gateway address:"),
            preffered_public_port: SpinnerField::new(ConfigKey::PrefferedPublicPort, "Preferred public port:"),
            preffered_private_port: SpinnerField::new(ConfigKey::PrefferedPrivatePort, "Preferred private port:"),
            refresh_interval: SpinnerField::new(ConfigKey::RefreshInterval, "Refresh interval (s):"),
            lifetime_interval: SpinnerField::new(ConfigKey::LifetimeInterval, "Lifetime (s):"),
            portchange_command: TextField::new("Port change command:"),
            last_update: Label::default(),
            public_ip_address: Label::default(),
            current_port: Label::default(),
        };
        form.set_enabled(false);
        form
    }
}

impl NatPmpForm {
    /// Check or uncheck the enable box; the other inputs follow it
    pub fn set_enabled(&mut self, checked: bool) {
        self.enabled.checked = checked;

        let disabled = !checked;
        self.exec_path.disabled = disabled;
        self.timeout.disabled = disabled;
        self.gateway_address.disabled = disabled;
        self.preffered_public_port.disabled = disabled;
        self.preffered_private_port.disabled = disabled;
        self.refresh_interval.disabled = disabled;
        self.lifetime_interval.disabled = disabled;
        self.portchange_command.disabled = disabled;
    }

    /// Show a fetched record
    pub fn load(&mut self, config: &NatPmpConfig) {
        self.set_enabled(config.enabled);
        self.exec_path.value = config.exec_path.clone();
        self.timeout.set_value(config.timeout as u32);
        self.gateway_address.value = config.gateway_address.clone();
        self.preffered_public_port.set_value(config.preffered_public_port as u32);
        self.preffered_private_port.set_value(config.preffered_private_port as u32);
        self.refresh_interval.set_value(config.refresh_interval);
        self.lifetime_interval.set_value(config.lifetime_interval);
        self.portchange_command.value = config.portchange_command.clone();
    }

    /// Read every input, disabled or not, into a record
    pub fn read(&self) -> Result<NatPmpConfig> {
        Ok(NatPmpConfig {
            enabled: self.enabled.checked,
            exec_path: self.exec_path.value.clone(),
            timeout: short(&self.timeout)?,
            gateway_address: self.gateway_address.value.clone(),
            preffered_public_port: short(&self.preffered_public_port)?,
            preffered_private_port: short(&self.preffered_private_port)?,
            refresh_interval: self.refresh_interval.number()?,
            lifetime_interval: self.lifetime_interval.number()?,
            portchange_command: self.portchange_command.value.clone(),
        })
    }

    pub fn load_status(&mut self, status: &NatPmpStatus) {
        self.last_update.text = status.last_update.clone();
        self.public_ip_address.text = status.public_ip_address.clone();
        self.current_port.text = status.current_port.clone();
    }
}

fn short(field: &SpinnerField) -> Result<u16> {
    let value = field.number()?;
    u16::try_from(value).map_err(|_| Error::InvalidField {
        field: field.key,
        value: field.text.clone(),
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Page
// ─────────────────────────────────────────────────────────────────────────────

pub struct NatPmpPage {
    client: NatPmpClient,
    form: Mutex<NatPmpForm>,
    /// Cleared by `on_destroy`; a detached page ignores show events
    attached: AtomicBool,
}

impl NatPmpPage {
    pub fn new(client: NatPmpClient) -> Self {
        Self {
            client,
            form: Mutex::new(NatPmpForm::default()),
            attached: AtomicBool::new(true),
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Lock the form for reading or editing
    pub fn form(&self) -> MutexGuard<'_, NatPmpForm> {
        self.form.lock()
    }

    /// Fetch the config and show it
    pub async fn update_config(&self) -> Result<()> {
        if !self.is_attached() {
            return Ok(());
        }

        let config = self.client.get_config().await?;

        if !self.is_attached() {
            debug!("Page destroyed during fetch, discarding config");
            return Ok(());
        }
        self.form.lock().load(&config);
        Ok(())
    }

    /// Fetch the status and show it
    pub async fn update_status(&self) -> Result<()> {
        if !self.is_attached() {
            return Ok(());
        }

        let status = self.client.get_status().await?;

        if !self.is_attached() {
            return Ok(());
        }
        self.form.lock().load_status(&status);
        Ok(())
    }

    /// Submit the form contents, returning the record that was sent
    pub async fn apply(&self) -> Result<NatPmpConfig> {
        let config = self.form.lock().read()?;
        self.client.set_config(&config).await?;
        info!("NAT-PMP preferences applied");
        Ok(config)
    }

    fn host_error(&self, err: Error) -> HostError {
        match err {
            Error::Rpc(e) => HostError::Rpc(e),
            other => HostError::Page {
                title: PAGE_TITLE.to_string(),
                message: other.to_string(),
            },
        }
    }
}

#[async_trait]
impl PreferencesPage for NatPmpPage {
    fn title(&self) -> &str {
        PAGE_TITLE
    }

    async fn on_show(&self) -> HostResult<()> {
        self.update_config().await.map_err(|e| self.host_error(e))?;
        self.update_status().await.map_err(|e| self.host_error(e))
    }

    async fn on_apply(&self) -> HostResult<()> {
        self.apply().await.map(|_| ()).map_err(|e| self.host_error(e))
    }

    fn on_destroy(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}
