//! Fenced code block extraction from free-form model text.

use std::sync::LazyLock;

use regex::Regex;

use crate::engine::Instruction;

/// Language tags a block may carry to be picked up. Untagged blocks are
/// treated as python.
pub const EXTRACTABLE_LANGUAGES: &[&str] =
    &["python", "bash", "sh", "shell", "c", "rust", "go", "javascript"];

const UNTAGGED_LANGUAGE: &str = "python";

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(\w+)?[ \t]*\r?\n(.*?)```").expect("valid regex"));

/// A fenced block with a recognised language tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Lowercased tag, `python` for untagged blocks.
    pub language: String,
    /// Block contents with surrounding whitespace trimmed.
    pub code: String,
}

/// All recognised, non-empty fenced blocks in `text`, in order.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    FENCED_BLOCK
        .captures_iter(text)
        .filter_map(|caps| {
            let language = caps
                .get(1)
                .map(|m| m.as_str().to_lowercase())
                .unwrap_or_else(|| UNTAGGED_LANGUAGE.to_string());
            if !EXTRACTABLE_LANGUAGES.contains(&language.as_str()) {
                return None;
            }
            let code = caps.get(2)?.as_str().trim();
            (!code.is_empty()).then(|| CodeBlock {
                language,
                code: code.to_string(),
            })
        })
        .collect()
}

/// Script instruction for the first recognised block in `text`.
pub fn extract_instruction(text: &str) -> Option<Instruction> {
    extract_code_blocks(text)
        .into_iter()
        .next()
        .map(|block| Instruction::Script {
            body: block.code,
            language: block.language,
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
