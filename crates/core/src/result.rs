//! Result types produced by the engine.
//!
//! [`ExecutionResult`] is what a single process invocation yields,
//! [`RemediationOutcome`] wraps it with install-and-retry provenance, and
//! [`ExecutionResponse`] is the flattened shape handed to the caller.

use serde::{Deserialize, Serialize};

/// Exit code reported when no real exit status exists (signal, timeout,
/// spawn failure).
pub const NO_EXIT_CODE: i32 = -1;

/// Captured output from one process invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// `true` iff the process exited with status 0 before its timeout.
    pub succeeded: bool,
    /// Complete stdout captured from the process.
    pub stdout: String,
    /// Complete stderr, `None` when the process wrote nothing to it.
    pub stderr: Option<String>,
    /// Process exit code ([`NO_EXIT_CODE`] if killed or never started).
    pub exit_code: i32,
    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Build a failed result that never reached a real exit status.
    pub fn failure(message: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            succeeded: false,
            stdout: String::new(),
            stderr: Some(message.into()),
            exit_code: NO_EXIT_CODE,
            timed_out: false,
            duration_ms,
        }
    }

    /// Text best describing why the process failed.
    ///
    /// Non-blank stderr is returned verbatim (compiler diagnostics keep
    /// their trailing newline). Otherwise trimmed stdout, and finally a
    /// generic exit-code message so the caller never sees an empty error.
    pub fn error_text(&self) -> String {
        if let Some(stderr) = self.stderr.as_deref() {
            if !stderr.trim().is_empty() {
                return stderr.to_string();
            }
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        format!("Process exited with code {}", self.exit_code)
    }

    /// Failure text used for missing-command classification: stderr, or
    /// stdout when stderr is empty.
    pub fn diagnostic_text(&self) -> &str {
        match self.stderr.as_deref() {
            Some(stderr) if !stderr.trim().is_empty() => stderr,
            _ => &self.stdout,
        }
    }
}

/// An [`ExecutionResult`] annotated with what the remediation step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    /// The final execution result (the retry, when one happened).
    #[serde(flatten)]
    pub result: ExecutionResult,
    /// Whether a package installation was attempted.
    pub install_attempted: bool,
    /// Command the classifier found missing.
    pub missing_command: Option<String>,
    /// Package handed to the package manager.
    pub package_installed: Option<String>,
    /// Whether the installation itself failed.
    pub install_failed: bool,
}

impl RemediationOutcome {
    /// Wrap a result for which no remediation took place.
    pub fn unremediated(result: ExecutionResult) -> Self {
        Self {
            result,
            install_attempted: false,
            missing_command: None,
            package_installed: None,
            install_failed: false,
        }
    }

    /// Shorthand for `self.result.succeeded`.
    pub fn succeeded(&self) -> bool {
        self.result.succeeded
    }
}

/// Structured result returned to the caller of the engine.
///
/// `error` is present iff `success` is false. The provenance fields are only
/// serialized for system commands where an install was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    pub success: bool,
    /// Trimmed stdout.
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub exit_code: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_attempted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package_installed: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub install_failed: Option<bool>,
}

impl ExecutionResponse {
    /// A failed response for a request rejected before anything ran.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
            exit_code: NO_EXIT_CODE,
            install_attempted: None,
            missing_command: None,
            package_installed: None,
            install_failed: None,
        }
    }
}

impl From<ExecutionResult> for ExecutionResponse {
    fn from(result: ExecutionResult) -> Self {
        let error = (!result.succeeded).then(|| result.error_text());
        Self {
            success: result.succeeded,
            output: result.stdout.trim().to_string(),
            error,
            exit_code: result.exit_code,
            install_attempted: None,
            missing_command: None,
            package_installed: None,
            install_failed: None,
        }
    }
}

impl From<RemediationOutcome> for ExecutionResponse {
    fn from(outcome: RemediationOutcome) -> Self {
        let mut response = ExecutionResponse::from(outcome.result);
        if outcome.install_attempted {
            response.install_attempted = Some(true);
            response.missing_command = outcome.missing_command;
            response.package_installed = outcome.package_installed;
            response.install_failed = Some(outcome.install_failed);
        }
        response
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stdout: &str, stderr: Option<&str>) -> ExecutionResult {
        ExecutionResult {
            succeeded: false,
            stdout: stdout.to_string(),
            stderr: stderr.map(str::to_string),
            exit_code: 2,
            timed_out: false,
            duration_ms: 4,
        }
    }

    #[test]
    fn error_text_is_stderr_verbatim() {
        let result = failed("partial", Some("  boom\n"));
        assert_eq!(result.error_text(), "  boom\n");
    }

    #[test]
    fn error_text_falls_back_to_trimmed_stdout() {
        let result = failed("  partial\n", None);
        assert_eq!(result.error_text(), "partial");
    }

    #[test]
    fn error_text_falls_back_to_exit_code() {
        let result = failed("", Some("   "));
        assert_eq!(result.error_text(), "Process exited with code 2");
    }

    #[test]
    fn diagnostic_text_uses_stdout_when_stderr_blank() {
        let result = failed("nmap: command not found", None);
        assert_eq!(result.diagnostic_text(), "nmap: command not found");
    }

    #[test]
    fn successful_result_has_no_error_and_trimmed_output() {
        let result = ExecutionResult {
            succeeded: true,
            stdout: "hello\n\n".to_string(),
            stderr: Some("warning: noisy".to_string()),
            exit_code: 0,
            timed_out: false,
            duration_ms: 1,
        };
        let response = ExecutionResponse::from(result);
        assert!(response.success);
        assert_eq!(response.output, "hello");
        assert!(response.error.is_none());
    }

    #[test]
    fn provenance_only_serialized_when_install_attempted() {
        let plain = ExecutionResponse::from(RemediationOutcome::unremediated(failed(
            "",
            Some("permission denied"),
        )));
        let json = serde_json::to_value(&plain).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "permission denied");
        assert!(json.get("installAttempted").is_none());
        assert!(json.get("missingCommand").is_none());

        let remediated = RemediationOutcome {
            result: ExecutionResult {
                succeeded: true,
                stdout: "done\n".to_string(),
                stderr: None,
                exit_code: 0,
                timed_out: false,
                duration_ms: 9,
            },
            install_attempted: true,
            missing_command: Some("nmap".to_string()),
            package_installed: Some("nmap".to_string()),
            install_failed: false,
        };
        let json = serde_json::to_value(ExecutionResponse::from(remediated)).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["output"], "done");
        assert_eq!(json["installAttempted"], true);
        assert_eq!(json["missingCommand"], "nmap");
        assert_eq!(json["packageInstalled"], "nmap");
        assert_eq!(json["installFailed"], false);
        assert!(json.get("error").is_none());
    }
}
