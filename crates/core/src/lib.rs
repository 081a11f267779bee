//! Command and script execution engine.
//!
//! This crate runs instructions produced upstream against the host:
//!
//! - [`Engine`]: routes an [`Instruction`] to the right executor and
//!   returns an [`ExecutionResponse`].
//! - [`CommandExecutor`]: system commands with sudo escalation and
//!   automatic install-and-retry through [`Remediator`].
//! - [`ScriptExecutor`]: python, bash and C bodies in throwaway
//!   workspaces.
//! - [`ProcessRunner`]: the only place a process is spawned.

pub mod classifier;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod extract;
pub mod packages;
pub mod remediation;
pub mod result;
pub mod runner;
pub mod script;

pub use classifier::{classify_missing_command, MissingCommandPatterns, PatternError};
pub use command::{CommandExecutor, ExecutionRequest};
pub use config::{ConfigError, EngineConfig};
pub use engine::{Engine, Instruction};
pub use error::ExecError;
pub use extract::extract_instruction;
pub use packages::resolve_package;
pub use remediation::Remediator;
pub use result::{ExecutionResponse, ExecutionResult, RemediationOutcome};
pub use runner::{CommandRunner, ProcessRunner};
pub use script::{ScriptExecutor, ScriptJob, ScriptLanguage};
