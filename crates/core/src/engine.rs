//! Entry point that routes upstream instructions to the executors.

use serde::{Deserialize, Serialize};

use crate::command::CommandExecutor;
use crate::config::{ConfigError, EngineConfig};
use crate::extract::extract_instruction;
use crate::result::ExecutionResponse;
use crate::script::ScriptExecutor;

/// Work requested by the upstream caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Instruction {
    /// A free-form system command line.
    Command { text: String },
    /// A script body in `language` (default `python`).
    Script {
        body: String,
        #[serde(default = "default_language")]
        language: String,
    },
}

fn default_language() -> String {
    "python".to_string()
}

/// Command and script execution behind a single call.
#[derive(Debug, Clone)]
pub struct Engine {
    commands: CommandExecutor,
    scripts: ScriptExecutor,
    scan_model_text: bool,
}

impl Engine {
    /// Build the executors from `config`, compiling its classifier patterns.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        let patterns = config.missing_command_patterns()?;
        Ok(Self {
            commands: CommandExecutor::from_config(&config, patterns),
            scripts: ScriptExecutor::from_config(&config),
            scan_model_text: config.scan_model_text,
        })
    }

    pub fn commands(&self) -> &CommandExecutor {
        &self.commands
    }

    pub fn scripts(&self) -> &ScriptExecutor {
        &self.scripts
    }

    /// Run `instruction` and describe the outcome.
    ///
    /// Rejected requests come back as failed responses; this never errors.
    pub async fn handle(&self, instruction: Instruction) -> ExecutionResponse {
        match instruction {
            Instruction::Command { text } => match self.commands.execute(&text).await {
                Ok(outcome) => outcome.into(),
                Err(e) => {
                    tracing::info!(error = %e, "Command rejected");
                    ExecutionResponse::rejected(e.to_string())
                }
            },
            Instruction::Script { body, language } => {
                match self.scripts.execute_script(&body, &language).await {
                    Ok(result) => result.into(),
                    Err(e) => {
                        tracing::info!(language = %language, error = %e, "Script rejected");
                        ExecutionResponse::rejected(e.to_string())
                    }
                }
            }
        }
    }

    /// Run the first fenced code block found in model output.
    ///
    /// Returns `None` when scanning is disabled or the text has no
    /// recognised block.
    pub async fn handle_model_text(&self, text: &str) -> Option<ExecutionResponse> {
        if !self.scan_model_text {
            return None;
        }
        let instruction = extract_instruction(text)?;
        tracing::debug!(?instruction, "Extracted instruction from model text");
        Some(self.handle(instruction).await)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
