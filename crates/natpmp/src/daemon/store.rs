//! Config Store
//!
//! Persists the plugin configuration as `natpmp.conf` in the daemon's config
//! directory. The file holds two concatenated JSON objects: a version header
//! followed by the configuration itself.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info};

use natpmp_types::{NatPmpConfig, NatPmpConfigPatch};

use crate::error::{Error, Result};

/// File name inside the config directory
pub const CONFIG_FILE: &str = "natpmp.conf";

/// Version header written before the config object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FileHeader {
    file: u32,
    format: u32,
}

const HEADER: FileHeader = FileHeader { file: 1, format: 1 };

/// The persisted plugin configuration
pub struct ConfigStore {
    path: PathBuf,
    config: RwLock<NatPmpConfig>,
}

impl ConfigStore {
    /// Open the store in `config_dir`, falling back to defaults if no file exists yet
    pub async fn open(config_dir: impl AsRef<Path>) -> Result<Self> {
        let path = config_dir.as_ref().join(CONFIG_FILE);

        let config = if fs::try_exists(&path).await? {
            let content = fs::read_to_string(&path).await?;
            let config = parse(&content)?;
            info!("Loaded config from {}", path.display());
            config
        } else {
            info!("No config at {}, using defaults", path.display());
            NatPmpConfig::default()
        };

        Ok(Self {
            path,
            config: RwLock::new(config),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current configuration
    pub fn get(&self) -> NatPmpConfig {
        self.config.read().clone()
    }

    /// Whether applying `patch` would change any stored value
    pub fn would_change(&self, patch: &NatPmpConfigPatch) -> bool {
        self.get().apply(patch)
    }

    /// Validate, apply and persist `patch`, returning whether anything changed
    ///
    /// The in-memory config only changes once the file has been written.
    pub async fn update(&self, patch: &NatPmpConfigPatch) -> Result<bool> {
        patch.validate()?;

        let mut next = self.get();
        let changed = next.apply(patch);
        next.validate()?;

        self.write(&next).await?;
        *self.config.write() = next;
        Ok(changed)
    }

    /// Write the current configuration to disk
    pub async fn save(&self) -> Result<()> {
        let config = self.get();
        self.write(&config).await
    }

    async fn write(&self, config: &NatPmpConfig) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).await?;
        }

        // Write-then-rename so a crash never leaves a truncated file
        let tmp = self.path.with_extension("conf.tmp");
        fs::write(&tmp, render(config)?).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Saved config to {}", self.path.display());
        Ok(())
    }
}

fn render(config: &NatPmpConfig) -> Result<String> {
    let header = serde_json::to_string_pretty(&HEADER)?;
    let body = serde_json::to_string_pretty(config)?;
    Ok(format!("{}{}", header, body))
}

fn parse(content: &str) -> Result<NatPmpConfig> {
    let values = serde_json::Deserializer::from_str(content)
        .into_iter::<Value>()
        .collect::<std::result::Result<Vec<_>, _>>()?;

    match values.as_slice() {
        // Bare config object without a header
        [config] => Ok(serde_json::from_value(config.clone())?),
        [header, config] => {
            let header: FileHeader = serde_json::from_value(header.clone())?;
            if header.format > HEADER.format {
                return Err(Error::ConfigFile(format!(
                    "unsupported config format {}",
                    header.format
                )));
            }
            Ok(serde_json::from_value(config.clone())?)
        }
        _ => Err(Error::ConfigFile(format!(
            "expected 1 or 2 JSON objects, found {}",
            values.len()
        ))),
    }
}
