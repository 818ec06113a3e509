//! External Commands
//!
//! Builds and runs the natpmpc and port-change command lines. Commands are
//! configured as a program followed by optional arguments, separated by
//! whitespace.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use natpmp_types::{NatPmpConfig, Protocol};

/// Check that a configured command names an existing program
///
/// Paths starting with `/` or `.` must exist; bare names must resolve on `PATH`.
pub fn is_command_valid(command: &str) -> bool {
    let Some(program) = command.split_whitespace().next() else {
        return false;
    };

    if program.starts_with('/') || program.starts_with('.') {
        return Path::new(program).exists();
    }

    which::which(program).is_ok()
}

/// Split a configured command into argv
pub fn split_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(String::from).collect()
}

/// `<exec_path> -a <public> <private> <proto> <lifetime> -g <gateway>`
pub fn natpmpc_args(config: &NatPmpConfig, protocol: Protocol) -> Vec<String> {
    let mut argv = split_command(&config.exec_path);
    argv.extend([
        "-a".to_string(),
        config.preffered_public_port.to_string(),
        config.preffered_private_port.to_string(),
        protocol.as_arg().to_string(),
        config.lifetime_interval.to_string(),
        "-g".to_string(),
        config.gateway_address.clone(),
    ]);
    argv
}

/// `<portchange_command> <old port> <udp port> <tcp port>`
pub fn portchange_args(command: &str, old_port: u16, udp_port: u16, tcp_port: u16) -> Vec<String> {
    let mut argv = split_command(command);
    argv.extend([
        old_port.to_string(),
        udp_port.to_string(),
        tcp_port.to_string(),
    ]);
    argv
}

/// Per-command timeout; zero disables it
pub fn command_timeout(config: &NatPmpConfig) -> Option<Duration> {
    (config.timeout > 0).then(|| Duration::from_secs(config.timeout as u64))
}

// ─────────────────────────────────────────────────────────────────────────────
// Command Runner
// ─────────────────────────────────────────────────────────────────────────────

/// Output of a command that ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status was zero
    pub success: bool,
    /// stdout followed by stderr
    pub output: String,
}

/// Errors from running an external command
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    #[error("Empty command line")]
    Empty,

    #[error("Failed to run {program}: {message}")]
    Spawn { program: String, message: String },

    #[error("{program} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

/// Runs external commands
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(
        &self,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError>;
}

/// Runs commands as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        argv: &[String],
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, CommandError> {
        let (program, args) = argv.split_first().ok_or(CommandError::Empty)?;

        let mut command = Command::new(program);
        command.args(args).stdin(Stdio::null()).kill_on_drop(true);
        let child = command.output();

        // Dropping the output future on timeout kills the child
        let result = match timeout {
            Some(limit) => tokio::time::timeout(limit, child).await.map_err(|_| {
                CommandError::TimedOut {
                    program: program.clone(),
                    timeout: limit,
                }
            })?,
            None => child.await,
        };

        let output = result.map_err(|e| CommandError::Spawn {
            program: program.clone(),
            message: e.to_string(),
        })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(CommandOutput {
            success: output.status.success(),
            output: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_command_is_invalid() {
        assert!(!is_command_valid(""));
        assert!(!is_command_valid("   "));
    }

    #[test]
    fn test_path_commands_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("on-port-change.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();

        let command = format!("{} --verbose", script.display());
        assert!(is_command_valid(&command));

        let missing = dir.path().join("missing.sh");
        assert!(!is_command_valid(&missing.display().to_string()));
        assert!(!is_command_valid("./definitely-not-here-natpmp"));
    }

    #[test]
    fn test_unknown_program_is_invalid() {
        assert!(!is_command_valid("natpmp-no-such-program-on-path"));
    }

    #[test]
    fn test_natpmpc_args() {
        let config = NatPmpConfig {
            exec_path: "natpmpc -q".to_string(),
            preffered_public_port: 1,
            preffered_private_port: 0,
            lifetime_interval: 60,
            gateway_address: "10.2.0.1".to_string(),
            ..Default::default()
        };

        assert_eq!(
            natpmpc_args(&config, Protocol::Tcp),
            vec!["natpmpc", "-q", "-a", "1", "0", "tcp", "60", "-g", "10.2.0.1"]
        );
    }

    #[test]
    fn test_portchange_args() {
        assert_eq!(
            portchange_args("/usr/local/bin/notify  --all", 6881, 51413, 51414),
            vec!["/usr/local/bin/notify", "--all", "6881", "51413", "51414"]
        );
    }

    #[test]
    fn test_command_timeout() {
        let mut config = NatPmpConfig::default();
        assert_eq!(command_timeout(&config), Some(Duration::from_secs(2)));

        config.timeout = 0;
        assert_eq!(command_timeout(&config), None);
    }

    #[tokio::test]
    async fn test_empty_argv_rejected() {
        let result = ProcessRunner.run(&[], None).await;
        assert!(matches!(result, Err(CommandError::Empty)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_captures_output() {
        let argv = vec!["sh".to_string(), "-c".to_string(), "echo mapped; exit 3".to_string()];
        let output = ProcessRunner.run(&argv, Some(Duration::from_secs(5))).await.unwrap();

        assert!(!output.success);
        assert_eq!(output.output.trim(), "mapped");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_process_runner_timeout() {
        let argv = vec!["sleep".to_string(), "5".to_string()];
        let result = ProcessRunner.run(&argv, Some(Duration::from_millis(50))).await;
        assert!(matches!(result, Err(CommandError::TimedOut { .. })));
    }
}
