//! Missing-command classification of process failure output.
//!
//! A failure is treated as "missing command" only when an extraction
//! pattern matches text that itself contains one of the known phrases and
//! yields a plausible command name. A phrase elsewhere in the output does
//! not count. Both lists are plain strings so new locales can be added from
//! configuration without touching the control flow.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

/// Phrases (matched case-insensitively) that indicate a missing executable.
pub const DEFAULT_PHRASES: &[&str] = &[
    "command not found",
    "comando no encontrado",
    "orden no encontrada",
    "no se encontró la orden",
    "no se ha encontrado la orden",
    ": not found",
    "' not found",
    "no such file or directory",
];

/// Extraction patterns, tried in order. Each has one capture group holding
/// the command name, and its match must span one of the phrases.
pub const DEFAULT_EXTRACTORS: &[&str] = &[
    // bash / sudo: `nmap: command not found`, `'nmap': comando no encontrado`
    r#"['"]?([\w.+-]+)['"]?:\s*(?:command\s+not\s+found|comando\s+no\s+encontrado|orden\s+no\s+encontrada)"#,
    // Ubuntu command-not-found handler: `Command 'nmap' not found`
    r#"command\s+['"]([\w.+-]+)['"]\s+not\s+found"#,
    // Spanish handler: `No se ha encontrado la orden «nmap»`
    r#"no\s+se\s+(?:ha\s+encontrado|encontró)\s+la\s+orden\s+[«'"]([\w.+-]+)[»'"]"#,
    // dash: `sh: 1: nmap: not found`
    r#"\b(?:sh|bash|dash|ksh):\s*(?:line\s+)?\d+:\s*([\w./+-]+):\s*not\s+found"#,
    // zsh / fish: `zsh: command not found: nmap`
    r#"command\s+not\s+found:\s*['"]?([\w.+-]+)"#,
    // exec of a missing path: `bash: /opt/bin/scan: No such file or directory`
    r#"(?m)^\s*(?:\S*/)?(?:sh|bash|dash|zsh|ksh)(?::\s*(?:line\s+)?\d+)?:\s*([\w./+-]+):\s*no\s+such\s+file\s+or\s+directory"#,
];

/// Tokens that name the reporting shell rather than the missing command.
const SHELL_NAMES: &[&str] = &["sh", "bash", "dash", "zsh", "ksh", "fish", "sudo", "env"];

static DEFAULT_PATTERNS: LazyLock<MissingCommandPatterns> = LazyLock::new(|| {
    MissingCommandPatterns::new(DEFAULT_PHRASES, DEFAULT_EXTRACTORS)
        .expect("built-in patterns are valid")
});

/// Error compiling a configured extraction pattern.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Invalid pattern '{pattern}': {source}")]
    Invalid {
        pattern: String,
        source: regex::Error,
    },

    #[error("Pattern '{0}' has no capture group for the command name")]
    NoCaptureGroup(String),
}

/// Compiled phrase and extraction lists.
#[derive(Debug, Clone)]
pub struct MissingCommandPatterns {
    /// Lowercased phrases; at least one must occur in the failure text.
    phrases: Vec<String>,
    /// Extraction regexes in evaluation order.
    extractors: Vec<Regex>,
}

impl Default for MissingCommandPatterns {
    fn default() -> Self {
        DEFAULT_PATTERNS.clone()
    }
}

impl MissingCommandPatterns {
    /// Compile the given phrase and pattern lists.
    pub fn new<P, E>(phrases: P, extractors: E) -> Result<Self, PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();

        let extractors = extractors
            .into_iter()
            .map(|p| compile_extractor(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            phrases,
            extractors,
        })
    }

    /// The built-in lists followed by `extra_phrases` and `extra_patterns`.
    pub fn with_extra(
        extra_phrases: &[String],
        extra_patterns: &[String],
    ) -> Result<Self, PatternError> {
        let mut patterns = Self::default();
        patterns.phrases.extend(
            extra_phrases
                .iter()
                .map(|p| p.trim().to_lowercase())
                .filter(|p| !p.is_empty()),
        );
        for pattern in extra_patterns {
            patterns.extractors.push(compile_extractor(pattern)?);
        }
        Ok(patterns)
    }

    /// Return the missing command named in `error_text`, if any.
    pub fn classify(&self, error_text: &str) -> Option<String> {
        let lowered = error_text.to_lowercase();
        if !self.phrases.iter().any(|p| lowered.contains(p.as_str())) {
            return None;
        }

        self.extractors.iter().find_map(|re| {
            re.captures_iter(error_text)
                .filter(|caps| self.spans_phrase(&caps[0]))
                .filter_map(|caps| caps.get(1))
                .find_map(|m| command_name(m.as_str()))
        })
    }

    /// Whether `matched` contains a phrase, ignoring case and whitespace runs.
    fn spans_phrase(&self, matched: &str) -> bool {
        let normalized = matched
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        self.phrases.iter().any(|p| normalized.contains(p.as_str()))
    }
}

/// Classify with the built-in patterns.
pub fn classify_missing_command(error_text: &str) -> Option<String> {
    DEFAULT_PATTERNS.classify(error_text)
}

fn compile_extractor(pattern: &str) -> Result<Regex, PatternError> {
    let re = RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|source| PatternError::Invalid {
            pattern: pattern.to_string(),
            source,
        })?;

    // Group 0 is the whole match.
    if re.captures_len() < 2 {
        return Err(PatternError::NoCaptureGroup(pattern.to_string()));
    }
    Ok(re)
}

/// Reduce an extracted token to a bare command name, or reject it.
fn command_name(token: &str) -> Option<String> {
    let token = token.trim_matches(|c| c == '\'' || c == '"' || c == '`');
    // Relative paths (`./configure`) are not installable commands, and a
    // leading `-` would reach the package manager as an option.
    if token.starts_with('.') || token.starts_with('-') {
        return None;
    }

    let name = token.rsplit('/').next().unwrap_or(token);
    let plausible = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
        && !name.chars().all(|c| c.is_ascii_digit())
        && !SHELL_NAMES.contains(&name.to_lowercase().as_str());

    plausible.then(|| name.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
