use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Result of the last successful port change, as shown on the status panel
///
/// All fields stay empty until a mapping changes the listen port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NatPmpStatus {
    /// Local time of the last port change (`YYYY-MM-DD HH:MM:SS`)
    pub last_update: String,
    pub public_ip_address: String,
    /// Mapped ports as `"<udp> / <tcp>"`
    pub current_port: String,
}

impl NatPmpStatus {
    /// Format a UDP/TCP port pair the way the status panel shows it
    pub fn format_ports(udp: u16, tcp: u16) -> String {
        format!("{} / {}", udp, tcp)
    }

    pub fn is_empty(&self) -> bool {
        self.last_update.is_empty() && self.public_ip_address.is_empty() && self.current_port.is_empty()
    }
}
