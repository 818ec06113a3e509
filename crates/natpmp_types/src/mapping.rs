//! natpmpc Output
//!
//! Parses the human-readable output of `natpmpc -a ...` into a
//! [`MappingResponse`].

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Transport protocol of a port mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Protocol {
    /// Argument passed to natpmpc
    pub fn as_arg(&self) -> &'static str {
        match self {
            Protocol::Udp => "udp",
            Protocol::Tcp => "tcp",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "udp" => Some(Protocol::Udp),
            "tcp" => Some(Protocol::Tcp),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Port mapping granted by the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortMapping {
    pub protocol: Protocol,
    pub public_port: u16,
    pub private_port: u16,
    pub lifetime: u32,
}

/// Everything natpmpc reported for one request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingResponse {
    pub gateway: Option<String>,
    pub public_ip: Option<String>,
    pub mapping: Option<PortMapping>,
}

impl MappingResponse {
    /// Parse natpmpc output; lines that are absent leave their field empty
    pub fn parse(output: &str) -> Self {
        let patterns = Patterns::get();

        let gateway = patterns
            .gateway
            .captures(output)
            .map(|c| c[1].to_string());

        let public_ip = patterns
            .public_ip
            .captures(output)
            .map(|c| c[1].to_string());

        let mapping = patterns.mapping.captures(output).and_then(|c| {
            Some(PortMapping {
                public_port: c[1].parse().ok()?,
                protocol: Protocol::parse(&c[2])?,
                private_port: c[3].parse().ok()?,
                lifetime: c[4].parse().ok()?,
            })
        });

        Self {
            gateway,
            public_ip,
            mapping,
        }
    }
}

struct Patterns {
    gateway: Regex,
    public_ip: Regex,
    mapping: Regex,
}

impl Patterns {
    fn get() -> &'static Patterns {
        static PATTERNS: OnceLock<Patterns> = OnceLock::new();
        PATTERNS.get_or_init(|| Patterns {
            gateway: Regex::new(r"\busing gateway : ([0-9a-fA-F.:]+)\b").expect("valid regex"),
            public_ip: Regex::new(r"\bPublic IP address : ([0-9a-fA-F.:]+)\b")
                .expect("valid regex"),
            mapping: Regex::new(
                r"\bMapped public port (\d{1,5}) protocol (\w{3}) to local port (\d{1,5}) lifetime (\d+)\b",
            )
            .expect("valid regex"),
        })
    }
}
