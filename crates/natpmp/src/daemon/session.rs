//! Torrent Session
//!
//! The slice of the host's torrent session the refresh logic drives.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::Result;

/// Host torrent session operations used after a port change
#[async_trait]
pub trait TorrentSession: Send + Sync + 'static {
    /// Port the session is currently listening on
    async fn listen_port(&self) -> Result<u16>;

    /// Reconfigure listen ports as `[udp, tcp]`
    async fn set_listen_ports(&self, udp_port: u16, tcp_port: u16) -> Result<()>;

    /// Ids of every torrent in the session
    async fn torrent_ids(&self) -> Result<Vec<String>>;

    /// Re-announce the given torrents to their trackers
    async fn force_reannounce(&self, torrent_ids: &[String]) -> Result<()>;
}

/// In-process session used when the daemon runs standalone
#[derive(Debug)]
pub struct MemorySession {
    listen_ports: RwLock<(u16, u16)>,
    torrents: RwLock<Vec<String>>,
    reannounces: AtomicUsize,
}

impl MemorySession {
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen_ports: RwLock::new((listen_port, listen_port)),
            torrents: RwLock::new(Vec::new()),
            reannounces: AtomicUsize::new(0),
        }
    }

    pub fn with_torrents(self, ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        *self.torrents.write() = ids.into_iter().map(Into::into).collect();
        self
    }

    /// Configured `(udp, tcp)` listen ports
    pub fn listen_ports(&self) -> (u16, u16) {
        *self.listen_ports.read()
    }

    /// Number of torrents re-announced so far
    pub fn reannounce_count(&self) -> usize {
        self.reannounces.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TorrentSession for MemorySession {
    async fn listen_port(&self) -> Result<u16> {
        Ok(self.listen_ports.read().0)
    }

    async fn set_listen_ports(&self, udp_port: u16, tcp_port: u16) -> Result<()> {
        *self.listen_ports.write() = (udp_port, tcp_port);
        Ok(())
    }

    async fn torrent_ids(&self) -> Result<Vec<String>> {
        Ok(self.torrents.read().clone())
    }

    async fn force_reannounce(&self, torrent_ids: &[String]) -> Result<()> {
        self.reannounces.fetch_add(torrent_ids.len(), Ordering::SeqCst);
        Ok(())
    }
}
