//! Script execution in a throwaway workspace.
//!
//! Each call writes the body into a fresh temporary directory, runs (or
//! compiles and runs) it there, and removes the directory before returning.
//! The directory is owned by a [`ScriptJob`] whose drop deletes it, so every
//! exit path cleans up, early returns and panics included.

use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tempfile::TempDir;

use crate::config::{EngineConfig, DEFAULT_SCRIPT_TIMEOUT};
use crate::error::ExecError;
use crate::result::ExecutionResult;
use crate::runner::ProcessRunner;

/// File name of the compiled binary inside a workspace.
const BINARY_NAME: &str = "program";

/// Languages a script body may be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptLanguage {
    Python,
    Bash,
    C,
}

impl ScriptLanguage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Bash => "bash",
            Self::C => "c",
        }
    }

    /// Source file name written into the workspace.
    pub fn source_file_name(self) -> &'static str {
        match self {
            Self::Python => "script.py",
            Self::Bash => "script.sh",
            Self::C => "script.c",
        }
    }

    /// Whether the source must be compiled before it can run.
    pub fn is_compiled(self) -> bool {
        matches!(self, Self::C)
    }
}

impl fmt::Display for ScriptLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptLanguage {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "bash" | "sh" | "shell" => Ok(Self::Bash),
            "c" => Ok(Self::C),
            _ => Err(ExecError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// A script body materialized in its own temporary directory.
///
/// Dropping the job deletes the directory and everything in it.
#[derive(Debug)]
pub struct ScriptJob {
    workspace: TempDir,
    language: ScriptLanguage,
    source_path: PathBuf,
    binary_path: Option<PathBuf>,
}

impl ScriptJob {
    /// Create a workspace under `parent` (or the system temp dir) and write
    /// `body` into it.
    pub async fn create(
        parent: Option<&Path>,
        body: &str,
        language: ScriptLanguage,
    ) -> Result<Self, ExecError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("shellpilot-");
        let workspace = match parent {
            // Children run with the workspace as cwd, so paths must be absolute.
            Some(dir) => builder.tempdir_in(std::path::absolute(dir)?)?,
            None => builder.tempdir()?,
        };

        let source_path = workspace.path().join(language.source_file_name());
        tokio::fs::write(&source_path, body).await?;

        let binary_path = language
            .is_compiled()
            .then(|| workspace.path().join(BINARY_NAME));

        Ok(Self {
            workspace,
            language,
            source_path,
            binary_path,
        })
    }

    pub fn workspace(&self) -> &Path {
        self.workspace.path()
    }

    pub fn language(&self) -> ScriptLanguage {
        self.language
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Where the compiler writes its output, for compiled languages.
    pub fn binary_path(&self) -> Option<&Path> {
        self.binary_path.as_deref()
    }

    /// Delete the workspace now, reporting any I/O error.
    pub fn close(self) -> std::io::Result<()> {
        self.workspace.close()
    }
}

/// Runs script bodies with per-language interpreters or a C compiler.
#[derive(Debug, Clone)]
pub struct ScriptExecutor {
    runner: ProcessRunner,
    python_bin: String,
    bash_bin: String,
    c_compiler: String,
    timeout: Duration,
    scratch_dir: Option<PathBuf>,
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self {
            runner: ProcessRunner::default(),
            python_bin: "python3".to_string(),
            bash_bin: "bash".to_string(),
            c_compiler: "gcc".to_string(),
            timeout: DEFAULT_SCRIPT_TIMEOUT,
            scratch_dir: None,
        }
    }
}

impl ScriptExecutor {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            runner: ProcessRunner::new(config.shell.clone()),
            python_bin: config.python_bin.clone(),
            bash_bin: config.bash_bin.clone(),
            c_compiler: config.c_compiler.clone(),
            timeout: config.script_timeout,
            scratch_dir: config.script_dir.clone(),
        }
    }

    /// Timeout applied to each subprocess (compile and run separately).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create workspaces under `dir` instead of the system temp dir.
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Run `body` as a script in `language`.
    ///
    /// Unsupported languages and blank bodies are rejected before anything
    /// touches the filesystem. A C compile failure is returned as a failed
    /// result whose stderr holds the compiler diagnostics.
    pub async fn execute_script(
        &self,
        body: &str,
        language: &str,
    ) -> Result<ExecutionResult, ExecError> {
        let language: ScriptLanguage = language.parse()?;
        if body.trim().is_empty() {
            return Err(ExecError::EmptyScript);
        }

        let job = ScriptJob::create(self.scratch_dir.as_deref(), body, language).await?;
        tracing::info!(
            language = %language,
            workspace = %job.workspace().display(),
            "Running script",
        );

        let result = self.run_job(&job).await;

        let workspace = job.workspace().to_path_buf();
        if let Err(e) = job.close() {
            tracing::warn!(workspace = %workspace.display(), error = %e, "Failed to remove script workspace");
        }

        Ok(result)
    }

    async fn run_job(&self, job: &ScriptJob) -> ExecutionResult {
        let dir = Some(job.workspace());
        let source = job.source_path().as_os_str();

        match (job.language(), job.binary_path()) {
            (ScriptLanguage::Python, _) => {
                self.runner
                    .run_program(&self.python_bin, [source], dir, self.timeout, &[])
                    .await
            }
            (ScriptLanguage::Bash, _) => {
                self.runner
                    .run_program(&self.bash_bin, [source], dir, self.timeout, &[])
                    .await
            }
            (ScriptLanguage::C, Some(binary)) => {
                let args = [source, OsStr::new("-o"), binary.as_os_str()];
                let compile = self
                    .runner
                    .run_program(&self.c_compiler, args, dir, self.timeout, &[])
                    .await;
                if !compile.succeeded {
                    tracing::info!(exit_code = compile.exit_code, "Compilation failed");
                    return compile;
                }
                self.runner
                    .run_program(binary, std::iter::empty::<&OsStr>(), dir, self.timeout, &[])
                    .await
            }
            (ScriptLanguage::C, None) => {
                ExecutionResult::failure("No binary path for compiled script", 0)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn tool_available(tool: &str) -> bool {
        std::process::Command::new(tool)
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .is_ok()
    }

    fn is_empty_dir(dir: &Path) -> bool {
        std::fs::read_dir(dir).expect("read scratch dir").next().is_none()
    }

    fn executor_in(scratch: &Path) -> ScriptExecutor {
        ScriptExecutor::default()
            .with_scratch_dir(scratch)
            .with_timeout(Duration::from_secs(20))
    }

    #[test]
    fn language_parsing_accepts_aliases() {
        assert_eq!("Python".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Python);
        assert_eq!("py".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Python);
        assert_eq!("SH".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Bash);
        assert_eq!("shell".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::Bash);
        assert_eq!(" c ".parse::<ScriptLanguage>().unwrap(), ScriptLanguage::C);
        assert_matches!(
            "cobol".parse::<ScriptLanguage>(),
            Err(ExecError::UnsupportedLanguage(lang)) if lang == "cobol"
        );
    }

    #[tokio::test]
    async fn bash_script_runs_and_cleans_up() {
        let scratch = tempfile::tempdir().expect("scratch");
        let result = executor_in(scratch.path())
            .execute_script("echo \"sum=$((2 + 3))\"\n", "bash")
            .await
            .expect("script runs");

        assert!(result.succeeded);
        assert_eq!(result.stdout.trim(), "sum=5");
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn script_runs_inside_its_workspace() {
        let scratch = tempfile::tempdir().expect("scratch");
        let result = executor_in(scratch.path())
            .execute_script("touch artifact.txt && ls\n", "sh")
            .await
            .expect("script runs");

        assert!(result.stdout.contains("artifact.txt"));
        assert!(result.stdout.contains("script.sh"));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn failing_script_reports_exit_code_and_cleans_up() {
        let scratch = tempfile::tempdir().expect("scratch");
        let result = executor_in(scratch.path())
            .execute_script("echo broken >&2\nexit 3\n", "bash")
            .await
            .expect("script runs");

        assert!(!result.succeeded);
        assert_eq!(result.exit_code, 3);
        assert_eq!(result.error_text(), "broken\n");
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn unsupported_language_touches_nothing() {
        let scratch = tempfile::tempdir().expect("scratch");
        let err = executor_in(scratch.path())
            .execute_script("print('hi')", "ruby")
            .await;

        assert_matches!(err, Err(ExecError::UnsupportedLanguage(lang)) if lang == "ruby");
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn blank_body_is_rejected() {
        let scratch = tempfile::tempdir().expect("scratch");
        let err = executor_in(scratch.path()).execute_script(" \n\t", "python").await;
        assert_matches!(err, Err(ExecError::EmptyScript));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn missing_scratch_dir_is_a_workspace_error() {
        let err = ScriptExecutor::default()
            .with_scratch_dir("/nonexistent/shellpilot/scratch")
            .execute_script("echo hi", "bash")
            .await;
        assert_matches!(err, Err(ExecError::Workspace(_)));
    }

    #[tokio::test]
    async fn timed_out_script_is_killed_and_cleaned_up() {
        let scratch = tempfile::tempdir().expect("scratch");
        let result = executor_in(scratch.path())
            .with_timeout(Duration::from_millis(300))
            .execute_script("sleep 20\n", "bash")
            .await
            .expect("script runs");

        assert!(!result.succeeded);
        assert!(result.timed_out);
        assert!(result.error_text().contains("timed out"));
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn python_script_runs() {
        if !tool_available("python3") {
            eprintln!("python3 not available, skipping");
            return;
        }
        let scratch = tempfile::tempdir().expect("scratch");
        let result = executor_in(scratch.path())
            .execute_script("print(sum(range(5)))\n", "python")
            .await
            .expect("script runs");

        assert!(result.succeeded);
        assert_eq!(result.stdout.trim(), "10");
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn c_program_compiles_and_runs() {
        if !tool_available("gcc") {
            eprintln!("gcc not available, skipping");
            return;
        }
        let scratch = tempfile::tempdir().expect("scratch");
        let body = "#include <stdio.h>\nint main(void) { printf(\"hi from c\\n\"); return 0; }\n";
        let result = executor_in(scratch.path())
            .execute_script(body, "c")
            .await
            .expect("script runs");

        assert!(result.succeeded, "stderr: {:?}", result.stderr);
        assert_eq!(result.stdout.trim(), "hi from c");
        assert!(is_empty_dir(scratch.path()));
    }

    #[tokio::test]
    async fn c_compile_failure_returns_diagnostics_without_running() {
        if !tool_available("gcc") {
            eprintln!("gcc not available, skipping");
            return;
        }
        let scratch = tempfile::tempdir().expect("scratch");
        let body = "int main(void) { this is not c; }\n";
        let result = executor_in(scratch.path())
            .execute_script(body, "c")
            .await
            .expect("script runs");

        assert!(!result.succeeded);
        assert!(result.stdout.is_empty());
        let diagnostics = result.stderr.as_deref().expect("compiler stderr");
        assert!(diagnostics.contains("error"), "got: {diagnostics}");
        assert_eq!(result.error_text(), diagnostics);
        let response = crate::result::ExecutionResponse::from(result.clone());
        assert_eq!(response.error.as_deref(), Some(diagnostics));
        assert!(is_empty_dir(scratch.path()));
    }
}
