//! Install-and-retry recovery for "command not found" failures.
//!
//! [`Remediator::remediate`] walks a small state machine:
//!
//! ```text
//! Attempting ──(nothing missing)──────────────► Failed (original result)
//!     │
//!     ▼
//! Installing ──(install failed / timed out)───► Failed (composite error)
//!     │
//!     ▼
//! Retrying ───(original command, once)────────► Resolved (retry result)
//! ```
//!
//! The retry never re-enters the machine, so one request runs its original
//! command at most twice.

use std::time::Duration;

use crate::classifier::MissingCommandPatterns;
use crate::command::ExecutionRequest;
use crate::config::{EngineConfig, DEFAULT_INSTALL_TIMEOUT};
use crate::packages::resolve_package;
use crate::result::{ExecutionResult, RemediationOutcome};
use crate::runner::CommandRunner;

/// Remediation step currently being evaluated.
enum State {
    Attempting(ExecutionResult),
    Installing {
        failed: ExecutionResult,
        missing_command: String,
        package: String,
    },
    Retrying {
        missing_command: String,
        package: String,
    },
    Resolved(RemediationOutcome),
    Failed(RemediationOutcome),
}

/// Installs missing packages and retries the command that needed them.
#[derive(Debug, Clone)]
pub struct Remediator {
    patterns: MissingCommandPatterns,
    package_manager: String,
    use_sudo: bool,
    install_timeout: Duration,
}

impl Default for Remediator {
    fn default() -> Self {
        Self {
            patterns: MissingCommandPatterns::default(),
            package_manager: "apt-get".to_string(),
            use_sudo: true,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
        }
    }
}

impl Remediator {
    pub fn new(
        patterns: MissingCommandPatterns,
        package_manager: impl Into<String>,
        use_sudo: bool,
        install_timeout: Duration,
    ) -> Self {
        Self {
            patterns,
            package_manager: package_manager.into(),
            use_sudo,
            install_timeout,
        }
    }

    /// Build from engine settings with already compiled patterns.
    pub fn from_config(config: &EngineConfig, patterns: MissingCommandPatterns) -> Self {
        Self::new(
            patterns,
            config.package_manager.clone(),
            config.auto_sudo,
            config.install_timeout,
        )
    }

    /// Shell line that refreshes the package index and installs `package`.
    pub fn install_command_line(&self, package: &str) -> String {
        let pm = &self.package_manager;
        if self.use_sudo {
            format!(
                "sudo {pm} update && sudo DEBIAN_FRONTEND=noninteractive {pm} install -y {package}"
            )
        } else {
            format!("{pm} update && {pm} install -y {package}")
        }
    }

    /// Try to recover from `failed`, the result of running `request`.
    ///
    /// `request.command_line` must be the line that actually ran (sudo
    /// prefix included); it is what gets retried.
    pub async fn remediate<R: CommandRunner>(
        &self,
        runner: &R,
        request: &ExecutionRequest,
        failed: ExecutionResult,
    ) -> RemediationOutcome {
        let mut state = State::Attempting(failed);

        loop {
            state = match state {
                State::Attempting(failed) => self.attempt(failed),
                State::Installing {
                    failed,
                    missing_command,
                    package,
                } => {
                    self.install(runner, failed, missing_command, package)
                        .await
                }
                State::Retrying {
                    missing_command,
                    package,
                } => {
                    let retry = ExecutionRequest {
                        allow_remediation: false,
                        ..request.clone()
                    };
                    tracing::info!(command = %retry.command_line, "Retrying command after install");
                    let result = runner.run(&retry.command_line, retry.timeout, &[]).await;
                    State::Resolved(RemediationOutcome {
                        result,
                        install_attempted: true,
                        missing_command: Some(missing_command),
                        package_installed: Some(package),
                        install_failed: false,
                    })
                }
                State::Resolved(outcome) => {
                    tracing::info!(
                        succeeded = outcome.succeeded(),
                        package = ?outcome.package_installed,
                        "Remediation finished",
                    );
                    return outcome;
                }
                State::Failed(outcome) => return outcome,
            };
        }
    }

    fn attempt(&self, failed: ExecutionResult) -> State {
        let Some(missing_command) = self.patterns.classify(failed.diagnostic_text()) else {
            tracing::debug!("Failure is not a missing command, skipping remediation");
            return State::Failed(RemediationOutcome::unremediated(failed));
        };

        let package = resolve_package(&missing_command);
        if package.is_empty() {
            return State::Failed(RemediationOutcome::unremediated(failed));
        }

        tracing::info!(command = %missing_command, package = %package, "Missing command detected");
        State::Installing {
            failed,
            missing_command,
            package,
        }
    }

    async fn install<R: CommandRunner>(
        &self,
        runner: &R,
        failed: ExecutionResult,
        missing_command: String,
        package: String,
    ) -> State {
        let line = self.install_command_line(&package);
        let env = [(
            "DEBIAN_FRONTEND".to_string(),
            "noninteractive".to_string(),
        )];

        tracing::info!(package = %package, timeout_secs = self.install_timeout.as_secs(), "Installing package");
        let install = runner.run(&line, self.install_timeout, &env).await;
        tracing::debug!(
            package = %package,
            stdout_bytes = install.stdout.len(),
            stderr = install.stderr.as_deref().unwrap_or(""),
            "Install output",
        );

        if install.succeeded {
            return State::Retrying {
                missing_command,
                package,
            };
        }

        tracing::warn!(
            package = %package,
            exit_code = install.exit_code,
            timed_out = install.timed_out,
            "Package installation failed",
        );

        State::Failed(RemediationOutcome {
            result: composite_failure(failed, &package, &install),
            install_attempted: true,
            missing_command: Some(missing_command),
            package_installed: Some(package),
            install_failed: true,
        })
    }
}

/// The original failure with the install failure appended to its error text.
fn composite_failure(
    original: ExecutionResult,
    package: &str,
    install: &ExecutionResult,
) -> ExecutionResult {
    let message = format!(
        "{}\nAutomatic installation of '{package}' failed: {}",
        original.error_text().trim_end(),
        install.error_text().trim_end(),
    );
    ExecutionResult {
        succeeded: false,
        stdout: original.stdout,
        stderr: Some(message),
        exit_code: original.exit_code,
        timed_out: original.timed_out,
        duration_ms: original.duration_ms + install.duration_ms,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
