//! JSON-lines wire format spoken on stdin/stdout.
//!
//! One request per input line, one response per output line. Responses
//! are written as requests complete, so their order can differ from the
//! input; the `id` ties them together.

use serde::{Deserialize, Serialize};
use shellpilot_core::{ExecutionResponse, Instruction};
use uuid::Uuid;

/// An instruction plus an optional caller-chosen id.
///
/// ```json
/// {"id": "42", "kind": "command", "text": "uptime"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub instruction: Instruction,
}

impl WorkerRequest {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }

    /// The caller's id, or a fresh UUIDv7 when none was given.
    pub fn into_parts(self) -> (String, Instruction) {
        let id = self.id.unwrap_or_else(|| Uuid::now_v7().to_string());
        (id, self.instruction)
    }
}

/// An [`ExecutionResponse`] tagged with the id of its request.
///
/// `id` is `null` only for lines that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: Option<String>,
    #[serde(flatten)]
    pub response: ExecutionResponse,
}

impl WorkerResponse {
    pub fn new(id: String, response: ExecutionResponse) -> Self {
        Self {
            id: Some(id),
            response,
        }
    }

    /// Response for an input line that is not a valid request.
    pub fn malformed(error: impl std::fmt::Display) -> Self {
        Self {
            id: None,
            response: ExecutionResponse::rejected(format!("Invalid request: {error}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
