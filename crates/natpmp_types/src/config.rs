//! Plugin Configuration
//!
//! The configuration record owned by the core plugin and edited through the
//! preferences page. Key names are part of the wire format, including the
//! `preffered_*` spelling.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Upper bound for `refresh_interval` and `lifetime_interval` (one day)
pub const MAX_INTERVAL_SECS: u32 = 86_400;

// ─────────────────────────────────────────────────────────────────────────────
// Config Keys
// ─────────────────────────────────────────────────────────────────────────────

/// The nine configuration keys, in form order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    Enabled,
    ExecPath,
    Timeout,
    GatewayAddress,
    PrefferedPublicPort,
    PrefferedPrivatePort,
    RefreshInterval,
    LifetimeInterval,
    PortchangeCommand,
}

impl ConfigKey {
    /// All keys in form order
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::Enabled,
        ConfigKey::ExecPath,
        ConfigKey::Timeout,
        ConfigKey::GatewayAddress,
        ConfigKey::PrefferedPublicPort,
        ConfigKey::PrefferedPrivatePort,
        ConfigKey::RefreshInterval,
        ConfigKey::LifetimeInterval,
        ConfigKey::PortchangeCommand,
    ];

    /// Wire name of the key
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::Enabled => "enabled",
            ConfigKey::ExecPath => "exec_path",
            ConfigKey::Timeout => "timeout",
            ConfigKey::GatewayAddress => "gateway_address",
            ConfigKey::PrefferedPublicPort => "preffered_public_port",
            ConfigKey::PrefferedPrivatePort => "preffered_private_port",
            ConfigKey::RefreshInterval => "refresh_interval",
            ConfigKey::LifetimeInterval => "lifetime_interval",
            ConfigKey::PortchangeCommand => "portchange_command",
        }
    }

    /// Inclusive numeric range for spinner-backed keys
    pub fn numeric_range(&self) -> Option<(u32, u32)> {
        match self {
            ConfigKey::Timeout
            | ConfigKey::PrefferedPublicPort
            | ConfigKey::PrefferedPrivatePort => Some((0, u16::MAX as u32)),
            ConfigKey::RefreshInterval | ConfigKey::LifetimeInterval => {
                Some((0, MAX_INTERVAL_SECS))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// A configuration value outside its allowed range
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{key} must be between {min} and {max}, got {value}")]
pub struct ValidationError {
    pub key: ConfigKey,
    pub value: u64,
    pub min: u32,
    pub max: u32,
}

fn check_interval(key: ConfigKey, value: u32) -> Result<(), ValidationError> {
    if value > MAX_INTERVAL_SECS {
        return Err(ValidationError {
            key,
            value: value as u64,
            min: 0,
            max: MAX_INTERVAL_SECS,
        });
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Record
// ─────────────────────────────────────────────────────────────────────────────

/// NAT-PMP plugin configuration (natpmp.conf)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(default)]
pub struct NatPmpConfig {
    /// Whether periodic port mapping is active
    pub enabled: bool,
    /// natpmpc executable, optionally followed by extra arguments
    pub exec_path: String,
    /// Per-command timeout in seconds, 0 disables the timeout
    pub timeout: u16,
    /// Gateway passed to natpmpc with `-g`
    pub gateway_address: String,
    pub preffered_public_port: u16,
    pub preffered_private_port: u16,
    /// Seconds between mapping refreshes
    pub refresh_interval: u32,
    /// Requested mapping lifetime in seconds
    pub lifetime_interval: u32,
    /// Run as `<command> <old port> <udp port> <tcp port>` after a port change
    pub portchange_command: String,
}

impl Default for NatPmpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            exec_path: "natpmpc".to_string(),
            timeout: 2,
            gateway_address: "10.2.0.1".to_string(),
            preffered_public_port: 1,
            preffered_private_port: 0,
            refresh_interval: 45,
            lifetime_interval: 60,
            portchange_command: String::new(),
        }
    }
}

impl NatPmpConfig {
    /// Check the interval ranges (port and timeout ranges are carried by `u16`)
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_interval(ConfigKey::RefreshInterval, self.refresh_interval)?;
        check_interval(ConfigKey::LifetimeInterval, self.lifetime_interval)
    }

    /// Apply every field present in `patch`, returning whether anything changed
    pub fn apply(&mut self, patch: &NatPmpConfigPatch) -> bool {
        let before = self.clone();

        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = &patch.exec_path {
            self.exec_path = v.clone();
        }
        if let Some(v) = patch.timeout {
            self.timeout = v;
        }
        if let Some(v) = &patch.gateway_address {
            self.gateway_address = v.clone();
        }
        if let Some(v) = patch.preffered_public_port {
            self.preffered_public_port = v;
        }
        if let Some(v) = patch.preffered_private_port {
            self.preffered_private_port = v;
        }
        if let Some(v) = patch.refresh_interval {
            self.refresh_interval = v;
        }
        if let Some(v) = patch.lifetime_interval {
            self.lifetime_interval = v;
        }
        if let Some(v) = &patch.portchange_command {
            self.portchange_command = v.clone();
        }

        *self != before
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Patch
// ─────────────────────────────────────────────────────────────────────────────

/// A partial configuration as accepted by `set_config`
///
/// Absent keys keep their stored value; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NatPmpConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preffered_public_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preffered_private_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lifetime_interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portchange_command: Option<String>,
}

impl NatPmpConfigPatch {
    /// Check the intervals that are present
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(v) = self.refresh_interval {
            check_interval(ConfigKey::RefreshInterval, v)?;
        }
        if let Some(v) = self.lifetime_interval {
            check_interval(ConfigKey::LifetimeInterval, v)?;
        }
        Ok(())
    }
}

impl From<NatPmpConfig> for NatPmpConfigPatch {
    fn from(config: NatPmpConfig) -> Self {
        Self {
            enabled: Some(config.enabled),
            exec_path: Some(config.exec_path),
            timeout: Some(config.timeout),
            gateway_address: Some(config.gateway_address),
            preffered_public_port: Some(config.preffered_public_port),
            preffered_private_port: Some(config.preffered_private_port),
            refresh_interval: Some(config.refresh_interval),
            lifetime_interval: Some(config.lifetime_interval),
            portchange_command: Some(config.portchange_command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_core_prefs() {
        let config = NatPmpConfig::default();
        assert!(!config.enabled);
        assert_eq!(config.exec_path, "natpmpc");
        assert_eq!(config.timeout, 2);
        assert_eq!(config.gateway_address, "10.2.0.1");
        assert_eq!(config.preffered_public_port, 1);
        assert_eq!(config.preffered_private_port, 0);
        assert_eq!(config.refresh_interval, 45);
        assert_eq!(config.lifetime_interval, 60);
        assert!(config.portchange_command.is_empty());
    }

    #[test]
    fn test_serialized_keys() {
        let value = serde_json::to_value(NatPmpConfig::default()).unwrap();
        let object = value.as_object().unwrap();

        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort();
        let mut expected: Vec<_> = ConfigKey::ALL.iter().map(|k| k.as_str()).collect();
        expected.sort();

        assert_eq!(keys, expected);
        assert!(object["timeout"].is_number());
        assert!(object["refresh_interval"].is_number());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: NatPmpConfig =
            serde_json::from_value(serde_json::json!({"enabled": true, "timeout": 5})).unwrap();
        assert!(config.enabled);
        assert_eq!(config.timeout, 5);
        assert_eq!(config.exec_path, "natpmpc");
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        let result: Result<NatPmpConfig, _> =
            serde_json::from_value(serde_json::json!({"preffered_public_port": 70000}));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_intervals() {
        let mut config = NatPmpConfig::default();
        assert!(config.validate().is_ok());

        config.lifetime_interval = MAX_INTERVAL_SECS + 1;
        let err = config.validate().unwrap_err();
        assert_eq!(err.key, ConfigKey::LifetimeInterval);
        assert_eq!(err.max, MAX_INTERVAL_SECS);
    }

    #[test]
    fn test_apply_patch_reports_change() {
        let mut config = NatPmpConfig::default();

        let unchanged = NatPmpConfigPatch {
            timeout: Some(2),
            ..Default::default()
        };
        assert!(!config.apply(&unchanged));

        let patch = NatPmpConfigPatch {
            enabled: Some(true),
            gateway_address: Some("192.168.1.1".to_string()),
            ..Default::default()
        };
        assert!(config.apply(&patch));
        assert!(config.enabled);
        assert_eq!(config.gateway_address, "192.168.1.1");
        assert_eq!(config.exec_path, "natpmpc");
    }

    #[test]
    fn test_patch_rejects_unknown_keys() {
        let result: Result<NatPmpConfigPatch, _> =
            serde_json::from_value(serde_json::json!({"enabled": true, "bogus": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_full_patch_reproduces_config() {
        let config = NatPmpConfig {
            enabled: true,
            refresh_interval: 30,
            ..Default::default()
        };

        let mut target = NatPmpConfig::default();
        target.apply(&NatPmpConfigPatch::from(config.clone()));
        assert_eq!(target, config);
    }
}
