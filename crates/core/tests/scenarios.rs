//! End-to-end scenarios for the execution engine.
//!
//! Remediation scenarios use a scripted [`CommandRunner`] so no package
//! manager is touched; the script and timeout scenarios spawn real
//! processes.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use shellpilot_core::{
    CommandExecutor, CommandRunner, Engine, EngineConfig, ExecutionResponse, ExecutionResult,
    Instruction, Remediator,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Replays canned results in order and records each command line.
#[derive(Default)]
struct ScriptedRunner {
    results: Mutex<VecDeque<ExecutionResult>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    fn new(results: impl IntoIterator<Item = ExecutionResult>) -> Self {
        Self {
            results: Mutex::new(results.into_iter().collect()),
            calls: Mutex::default(),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandRunner for ScriptedRunner {
    async fn run(
        &self,
        command_line: &str,
        _timeout: Duration,
        _env: &[(String, String)],
    ) -> ExecutionResult {
        self.calls.lock().unwrap().push(command_line.to_string());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted runner exhausted")
    }
}

fn exited(code: i32, stdout: &str, stderr: Option<&str>) -> ExecutionResult {
    ExecutionResult {
        succeeded: code == 0,
        stdout: stdout.to_string(),
        stderr: stderr.map(str::to_string),
        exit_code: code,
        timed_out: false,
        duration_ms: 5,
    }
}

fn tool_available(tool: &str) -> bool {
    std::process::Command::new(tool)
        .arg("--version")
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .is_ok()
}

/// Pids whose command line contains `marker`, excluding this process.
fn processes_matching(marker: &str) -> Vec<u32> {
    let me = std::process::id();
    let Ok(entries) = std::fs::read_dir("/proc") else {
        return Vec::new();
    };
    entries
        .filter_map(Result::ok)
        .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
        .filter(|pid| *pid != me)
        .filter(|pid| {
            std::fs::read(format!("/proc/{pid}/cmdline"))
                .map(|raw| String::from_utf8_lossy(&raw).replace('\0', " ").contains(marker))
                .unwrap_or(false)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Scenario A: missing tool installed and retried
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_nmap_is_installed_and_scan_retried() {
    let runner = ScriptedRunner::new([
        exited(1, "", Some("sudo: nmap: command not found\n")),
        exited(0, "Setting up nmap ...\n", None),
        exited(0, "Nmap done: 1 IP address (1 host up)\n", None),
    ]);
    let executor = CommandExecutor::new(runner, Remediator::default());

    let outcome = executor.execute("nmap -sS target").await.expect("accepted");
    let response = ExecutionResponse::from(outcome);

    assert!(response.success);
    assert_eq!(response.output, "Nmap done: 1 IP address (1 host up)");
    assert_eq!(response.install_attempted, Some(true));
    assert_eq!(response.missing_command.as_deref(), Some("nmap"));
    assert_eq!(response.package_installed.as_deref(), Some("nmap"));
    assert_eq!(response.install_failed, Some(false));

    let calls = executor.runner().calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0], "sudo nmap -sS target");
    assert_eq!(calls[2], "sudo nmap -sS target");

    let json = serde_json::to_value(&response).expect("serialize");
    assert_eq!(json["installAttempted"], true);
    assert_eq!(json["missingCommand"], "nmap");
    assert_eq!(json["packageInstalled"], "nmap");
}

// ---------------------------------------------------------------------------
// Scenario B: unrelated failure passes through
// ---------------------------------------------------------------------------

#[tokio::test]
async fn permission_error_is_reported_verbatim_without_install() {
    let runner = ScriptedRunner::new([exited(
        1,
        "",
        Some("ps: cannot open /proc/1/stat: Permission denied\n"),
    )]);
    let executor = CommandExecutor::new(runner, Remediator::default());

    let response = ExecutionResponse::from(executor.execute("ps aux").await.expect("accepted"));

    assert!(!response.success);
    assert_eq!(
        response.error.as_deref(),
        Some("ps: cannot open /proc/1/stat: Permission denied\n")
    );
    assert!(response.install_attempted.is_none());
    assert_eq!(executor.runner().calls(), vec!["ps aux"]);
}

// ---------------------------------------------------------------------------
// Scenario C: C compile failure
// ---------------------------------------------------------------------------

#[tokio::test]
async fn c_compile_failure_returns_compiler_stderr_and_leaves_nothing() {
    if !tool_available("gcc") {
        eprintln!("gcc not available, skipping");
        return;
    }
    let scratch = tempfile::tempdir().expect("scratch");
    let engine = Engine::new(EngineConfig {
        script_dir: Some(scratch.path().to_path_buf()),
        ..EngineConfig::default()
    })
    .expect("engine");

    let response = engine
        .handle(Instruction::Script {
            body: "int main(void) { return undefined_symbol; }\n".to_string(),
            language: "c".to_string(),
        })
        .await;

    assert!(!response.success);
    assert!(response.output.is_empty());
    let error = response.error.expect("compiler diagnostics");
    assert!(error.contains("undefined_symbol"), "got: {error}");
    assert!(error.ends_with('\n'), "diagnostics are passed through untrimmed");
    assert!(std::fs::read_dir(scratch.path())
        .expect("read scratch")
        .next()
        .is_none());
}

// ---------------------------------------------------------------------------
// Scenario D: timeout leaves no orphans
// ---------------------------------------------------------------------------

#[tokio::test]
async fn timed_out_command_leaves_no_orphaned_processes() {
    const MARKER: &str = "41.123";

    let engine = Engine::new(EngineConfig {
        command_timeout: Duration::from_secs(1),
        auto_sudo: false,
        allow_remediation: false,
        ..EngineConfig::default()
    })
    .expect("engine");

    let started = Instant::now();
    let response = engine
        .handle(Instruction::Command {
            text: format!("sleep {MARKER} & sleep {MARKER}; echo after"),
        })
        .await;

    assert!(!response.success);
    assert!(started.elapsed() < Duration::from_secs(10));
    let error = response.error.expect("timeout message");
    assert!(error.contains("timed out after 1s"), "got: {error}");
    assert!(!response.output.contains("after"));

    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let survivors = processes_matching(&format!("sleep {MARKER}"));
        if survivors.is_empty() {
            break;
        }
        assert!(
            Instant::now() < deadline,
            "orphaned processes still running: {survivors:?}"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[tokio::test]
async fn script_instruction_from_json_runs_end_to_end() {
    let engine = Engine::new(EngineConfig::default()).expect("engine");
    let instruction: Instruction = serde_json::from_str(
        r#"{"kind":"script","language":"bash","body":"echo one; echo two >&2"}"#,
    )
    .expect("parse instruction");

    let response = engine.handle(instruction).await;
    let json = serde_json::to_value(&response).expect("serialize");

    assert_eq!(json["success"], true);
    assert_eq!(json["output"], "one");
    assert_eq!(json["exitCode"], 0);
    assert!(json.get("error").is_none());
    assert!(json.get("installAttempted").is_none());
}
