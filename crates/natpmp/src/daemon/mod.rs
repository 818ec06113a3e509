//! Daemon-side Plugin
//!
//! Owns the authoritative NAT-PMP configuration and keeps a port mapping alive.
//!
//! Refresh cycle:
//! 1. Map a UDP and a TCP port through natpmpc
//! 2. If the mapped ports differ from the session's listen port, switch the
//!    session to them and record the new status
//! 3. Run the configured port-change command
//! 4. Re-announce every torrent

mod command;
mod exports;
mod plugin;
mod refresh;
mod session;
mod store;

pub use command::{
    command_timeout, is_command_valid, natpmpc_args, portchange_args, split_command,
    CommandError, CommandOutput, CommandRunner, ProcessRunner,
};
pub use exports::*;
pub use plugin::*;
pub use refresh::*;
pub use session::*;
pub use store::*;
