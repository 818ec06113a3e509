//! Port Refresh
//!
//! One refresh maps a UDP and a TCP port at the gateway and, when the mapped
//! ports differ from the session's listen port, moves the session onto them.

use async_trait::async_trait;
use chrono::Local;
use tracing::{debug, info, warn};

use natpmp_types::{MappingResponse, NatPmpConfig, NatPmpStatus, PortMapping, Protocol};
use plugin_host::service::{Service, ServiceContext, ServiceError, ServiceResult, ServiceSpec};

use super::command::{self, command_timeout, natpmpc_args, portchange_args};
use super::plugin::{NatPmpCore, REFRESH_SERVICE_ID};
use crate::error::Result;

/// What a single refresh did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A mapping was missing from the natpmpc output
    Failed,
    /// Both mappings match the current listen port
    Unchanged { port: u16 },
    /// The session now listens on the mapped ports
    PortChanged { from: u16, udp_port: u16, tcp_port: u16 },
}

impl NatPmpCore {
    /// Renew both mappings and follow a changed public port
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let config = self.get_config();

        let (udp, udp_output) = self.map_port(&config, Protocol::Udp).await;
        let (tcp, tcp_output) = self.map_port(&config, Protocol::Tcp).await;

        let mapped = udp
            .as_ref()
            .and_then(|r| r.mapping)
            .zip(tcp.as_ref().and_then(|r| r.mapping));

        let Some((udp_mapping, tcp_mapping)) = mapped else {
            warn!("Failed to update NAT-PMP mapped port");
            warn!(output = %udp_output, "natpmpc udp");
            warn!(output = %tcp_output, "natpmpc tcp");
            return Ok(RefreshOutcome::Failed);
        };

        let current = self.session().listen_port().await?;
        if current == udp_mapping.public_port && current == tcp_mapping.public_port {
            debug!(port = current, "Mapped ports unchanged");
            return Ok(RefreshOutcome::Unchanged { port: current });
        }

        let public_ip = udp.and_then(|r| r.public_ip).unwrap_or_default();
        self.record_port_change(public_ip, udp_mapping, tcp_mapping);

        info!(
            from = current,
            udp = udp_mapping.public_port,
            tcp = tcp_mapping.public_port,
            "Listen port changed"
        );
        self.session()
            .set_listen_ports(udp_mapping.public_port, tcp_mapping.public_port)
            .await?;

        self.run_portchange(&config, current, udp_mapping.public_port, tcp_mapping.public_port)
            .await;

        let torrents = self.session().torrent_ids().await?;
        self.session().force_reannounce(&torrents).await?;
        debug!(count = torrents.len(), "Re-announced torrents");

        Ok(RefreshOutcome::PortChanged {
            from: current,
            udp_port: udp_mapping.public_port,
            tcp_port: tcp_mapping.public_port,
        })
    }

    /// Run natpmpc once; returns the parsed response (if it succeeded) and its raw output
    async fn map_port(
        &self,
        config: &NatPmpConfig,
        protocol: Protocol,
    ) -> (Option<MappingResponse>, String) {
        let argv = natpmpc_args(config, protocol);

        match self.runner().run(&argv, command_timeout(config)).await {
            Ok(out) if out.success => (Some(MappingResponse::parse(&out.output)), out.output),
            Ok(out) => {
                warn!(%protocol, "natpmpc exited with an error");
                (None, out.output)
            }
            Err(e) => {
                warn!(%protocol, error = %e, "natpmpc failed");
                (None, String::new())
            }
        }
    }

    fn record_port_change(&self, public_ip: String, udp: PortMapping, tcp: PortMapping) {
        self.set_status(NatPmpStatus {
            last_update: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            public_ip_address: public_ip,
            current_port: NatPmpStatus::format_ports(udp.public_port, tcp.public_port),
        });
    }

    async fn run_portchange(&self, config: &NatPmpConfig, old: u16, udp: u16, tcp: u16) {
        if config.portchange_command.trim().is_empty() {
            return;
        }
        if !command::is_command_valid(&config.portchange_command) {
            warn!(command = %config.portchange_command, "Port change command not found");
            return;
        }

        let argv = portchange_args(&config.portchange_command, old, udp, tcp);
        match self.runner().run(&argv, command_timeout(config)).await {
            Ok(out) if out.success => debug!(output = %out.output, "Port change command finished"),
            Ok(out) => warn!(output = %out.output, "Port change command exited with an error"),
            Err(e) => warn!(error = %e, "Port change command failed"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Refresh Service
// ─────────────────────────────────────────────────────────────────────────────

/// Runs [`NatPmpCore::refresh`] on every tick
///
/// Spawned idle; the core sets and clears its tick interval.
pub struct RefreshService {
    core: NatPmpCore,
}

impl RefreshService {
    pub fn new(core: NatPmpCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Service for RefreshService {
    fn spec(&self) -> ServiceSpec {
        ServiceSpec::new(REFRESH_SERVICE_ID, "NAT-PMP Refresh")
    }

    async fn on_start(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
        debug!("Refresh service started");
        Ok(())
    }

    async fn on_stop(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
        debug!("Refresh service stopped");
        Ok(())
    }

    async fn on_tick(&mut self, _ctx: &ServiceContext) -> ServiceResult<()> {
        self.core
            .refresh()
            .await
            .map(|_| ())
            .map_err(|e| ServiceError::TickFailed(e.to_string()))
    }
}
