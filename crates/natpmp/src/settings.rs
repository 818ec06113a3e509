//! Daemon Settings
//!
//! Where the daemon listens and keeps its files. Layered from built-in
//! defaults, an optional TOML file, then `NATPMP_*` environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Server host address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Directory holding natpmp.conf
    pub config_dir: PathBuf,
    /// Initial listen port of the in-process torrent session
    pub listen_port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8112,
            config_dir: PathBuf::from("./config"),
            listen_port: 6881,
        }
    }
}

impl Settings {
    /// Load settings; a missing file is skipped
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if let Some(path) = file {
            figment = figment.merge(Toml::file(path));
        }

        Ok(figment.merge(Env::prefixed("NATPMP_")).extract()?)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| Error::Settings(format!("invalid bind address: {}", e)))
    }
}
