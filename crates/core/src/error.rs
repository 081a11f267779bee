//! Request-level errors.
//!
//! Process failures (non-zero exits, timeouts, compile errors, failed
//! installs) are not errors here: they are reported as failed
//! [`ExecutionResult`](crate::result::ExecutionResult)s. `ExecError` covers
//! requests that are rejected before or while preparing to run anything.

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Command is empty")]
    EmptyCommand,

    #[error("Script body is empty")]
    EmptyScript,

    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("Failed to prepare script workspace: {0}")]
    Workspace(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unsupported_language() {
        let err = ExecError::UnsupportedLanguage("cobol".to_string());
        assert_eq!(err.to_string(), "Unsupported language: cobol");
    }

    #[test]
    fn display_workspace_keeps_io_message() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only fs");
        let err = ExecError::from(inner);
        assert!(err.to_string().starts_with("Failed to prepare script workspace:"));
        assert!(err.to_string().contains("read-only fs"));
    }

    #[test]
    fn workspace_error_has_source() {
        let err = ExecError::Workspace(std::io::Error::other("boom"));
        assert!(std::error::Error::source(&err).is_some());
        assert!(std::error::Error::source(&ExecError::EmptyCommand).is_none());
    }
}
