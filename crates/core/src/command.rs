//! System command execution with privilege escalation and remediation.

use std::time::Duration;

use crate::classifier::MissingCommandPatterns;
use crate::config::{EngineConfig, DEFAULT_COMMAND_TIMEOUT};
use crate::error::ExecError;
use crate::remediation::Remediator;
use crate::result::RemediationOutcome;
use crate::runner::{CommandRunner, ProcessRunner};

/// Commands that need root for raw sockets, packet capture, firewall or
/// service control, or full process/socket visibility.
const PRIVILEGED_COMMANDS: &[&str] = &[
    "nmap",
    "masscan",
    "hping3",
    "arp-scan",
    "netdiscover",
    "tcpdump",
    "tshark",
    "iftop",
    "nethogs",
    "iptables",
    "ip6tables",
    "nft",
    "ufw",
    "systemctl",
    "service",
    "journalctl",
    "lsof",
    "netstat",
    "ss",
    "airmon-ng",
    "airodump-ng",
    "aireplay-ng",
    "iwlist",
    "dmidecode",
    "fdisk",
    "mount",
    "umount",
    "modprobe",
];

/// One system command to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    /// Command line passed to the shell.
    pub command_line: String,
    pub timeout: Duration,
    /// Whether a missing-command failure may trigger install and retry.
    pub allow_remediation: bool,
}

/// Whether the first token of `command_line` is a known privileged tool.
///
/// Paths count by basename, so `/usr/sbin/tcpdump` matches `tcpdump`.
pub fn needs_privilege(command_line: &str) -> bool {
    let Some(first) = command_line.split_whitespace().next() else {
        return false;
    };
    let name = first.rsplit('/').next().unwrap_or(first).to_lowercase();
    PRIVILEGED_COMMANDS.contains(&name.as_str())
}

/// Runs system commands through a [`CommandRunner`], recovering from
/// missing binaries with a [`Remediator`].
#[derive(Debug, Clone)]
pub struct CommandExecutor<R: CommandRunner = ProcessRunner> {
    runner: R,
    remediator: Remediator,
    timeout: Duration,
    allow_remediation: bool,
    auto_sudo: bool,
}

impl CommandExecutor<ProcessRunner> {
    pub fn from_config(config: &EngineConfig, patterns: MissingCommandPatterns) -> Self {
        Self::new(
            ProcessRunner::new(config.shell.clone()),
            Remediator::from_config(config, patterns),
        )
        .with_timeout(config.command_timeout)
        .with_remediation(config.allow_remediation)
        .with_auto_sudo(config.auto_sudo)
    }
}

impl<R: CommandRunner> CommandExecutor<R> {
    /// Executor with a 30s timeout, remediation on and sudo escalation on.
    pub fn new(runner: R, remediator: Remediator) -> Self {
        Self {
            runner,
            remediator,
            timeout: DEFAULT_COMMAND_TIMEOUT,
            allow_remediation: true,
            auto_sudo: true,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_remediation(mut self, allow: bool) -> Self {
        self.allow_remediation = allow;
        self
    }

    pub fn with_auto_sudo(mut self, enabled: bool) -> Self {
        self.auto_sudo = enabled;
        self
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Trim `raw` and prepend `sudo ` when it names a privileged tool.
    pub fn compose_command_line(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if self.auto_sudo && !trimmed.starts_with("sudo ") && needs_privilege(trimmed) {
            format!("sudo {trimmed}")
        } else {
            trimmed.to_string()
        }
    }

    /// Run `raw_command` with the configured timeout and remediation policy.
    pub async fn execute(&self, raw_command: &str) -> Result<RemediationOutcome, ExecError> {
        self.execute_request(ExecutionRequest {
            command_line: raw_command.to_string(),
            timeout: self.timeout,
            allow_remediation: self.allow_remediation,
        })
        .await
    }

    /// Run `request`, overriding the configured timeout and policy.
    pub async fn execute_request(
        &self,
        request: ExecutionRequest,
    ) -> Result<RemediationOutcome, ExecError> {
        if request.command_line.trim().is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let request = ExecutionRequest {
            command_line: self.compose_command_line(&request.command_line),
            ..request
        };

        tracing::info!(
            command = %request.command_line,
            timeout_secs = request.timeout.as_secs(),
            "Executing command",
        );
        let result = self
            .runner
            .run(&request.command_line, request.timeout, &[])
            .await;

        if result.succeeded || !request.allow_remediation {
            return Ok(RemediationOutcome::unremediated(result));
        }

        Ok(self
            .remediator
            .remediate(&self.runner, &request, result)
            .await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
