//! Engine configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::classifier::{MissingCommandPatterns, PatternError};
use crate::runner::DEFAULT_SHELL;

/// Default timeout for interactive system commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for each script subprocess (compile and run).
pub const DEFAULT_SCRIPT_TIMEOUT: Duration = Duration::from_secs(30);
/// Default timeout for a package installation (network fetch included).
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(300);

/// Error raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{key} must be {expected}, got '{value}'")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        value: String,
    },

    #[error(transparent)]
    Pattern(#[from] PatternError),
}

/// Runtime settings for the execution engine.
///
/// [`Default`] gives the values documented on [`EngineConfig::from_env`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Shell used to interpret command lines.
    pub shell: String,
    pub command_timeout: Duration,
    pub script_timeout: Duration,
    pub install_timeout: Duration,
    /// Install missing packages and retry failed commands.
    pub allow_remediation: bool,
    /// Prefix privileged commands and installs with `sudo`.
    pub auto_sudo: bool,
    /// Package manager binary (`update` and `install -y` subcommands).
    pub package_manager: String,
    pub python_bin: String,
    pub bash_bin: String,
    pub c_compiler: String,
    /// Parent directory for script workspaces (`None` = system temp dir).
    pub script_dir: Option<PathBuf>,
    /// Phrases appended to the built-in missing-command phrases.
    pub missing_command_phrases: Vec<String>,
    /// Extraction regexes appended to the built-in ones.
    pub missing_command_patterns: Vec<String>,
    /// Sweep free-form model text for fenced code blocks.
    pub scan_model_text: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            shell: DEFAULT_SHELL.to_string(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            script_timeout: DEFAULT_SCRIPT_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            allow_remediation: true,
            auto_sudo: true,
            package_manager: "apt-get".to_string(),
            python_bin: "python3".to_string(),
            bash_bin: "bash".to_string(),
            c_compiler: "gcc".to_string(),
            script_dir: None,
            missing_command_phrases: Vec::new(),
            missing_command_patterns: Vec::new(),
            scan_model_text: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default     |
    /// |----------------------------|-------------|
    /// | `EXEC_SHELL`               | `/bin/sh`   |
    /// | `COMMAND_TIMEOUT_SECS`     | `30`        |
    /// | `SCRIPT_TIMEOUT_SECS`      | `30`        |
    /// | `INSTALL_TIMEOUT_SECS`     | `300`       |
    /// | `ALLOW_REMEDIATION`        | `true`      |
    /// | `AUTO_SUDO`                | `true`      |
    /// | `PACKAGE_MANAGER`          | `apt-get`   |
    /// | `PYTHON_BIN`               | `python3`   |
    /// | `BASH_BIN`                 | `bash`      |
    /// | `C_COMPILER`               | `gcc`       |
    /// | `SCRIPT_TMP_DIR`           | system temp |
    /// | `MISSING_COMMAND_PHRASES`  | none (comma-separated)  |
    /// | `MISSING_COMMAND_PATTERNS` | none (`;;`-separated)   |
    /// | `SCAN_MODEL_TEXT`          | `false`     |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let config = Self {
            shell: string_or(&lookup, "EXEC_SHELL", defaults.shell),
            command_timeout: secs_or(&lookup, "COMMAND_TIMEOUT_SECS", defaults.command_timeout)?,
            script_timeout: secs_or(&lookup, "SCRIPT_TIMEOUT_SECS", defaults.script_timeout)?,
            install_timeout: secs_or(&lookup, "INSTALL_TIMEOUT_SECS", defaults.install_timeout)?,
            allow_remediation: flag_or(&lookup, "ALLOW_REMEDIATION", defaults.allow_remediation)?,
            auto_sudo: flag_or(&lookup, "AUTO_SUDO", defaults.auto_sudo)?,
            package_manager: string_or(&lookup, "PACKAGE_MANAGER", defaults.package_manager),
            python_bin: string_or(&lookup, "PYTHON_BIN", defaults.python_bin),
            bash_bin: string_or(&lookup, "BASH_BIN", defaults.bash_bin),
            c_compiler: string_or(&lookup, "C_COMPILER", defaults.c_compiler),
            script_dir: lookup("SCRIPT_TMP_DIR")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            missing_command_phrases: split_list(lookup("MISSING_COMMAND_PHRASES"), ","),
            missing_command_patterns: split_list(lookup("MISSING_COMMAND_PATTERNS"), ";;"),
            scan_model_text: flag_or(&lookup, "SCAN_MODEL_TEXT", defaults.scan_model_text)?,
        };

        // Fail at startup rather than on the first failed command.
        config.missing_command_patterns()?;

        Ok(config)
    }

    /// Compile the built-in classification patterns plus configured extras.
    pub fn missing_command_patterns(&self) -> Result<MissingCommandPatterns, PatternError> {
        MissingCommandPatterns::with_extra(
            &self.missing_command_phrases,
            &self.missing_command_patterns,
        )
    }
}

fn string_or<F>(lookup: &F, key: &str, default: String) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or(default)
}

fn secs_or<F>(lookup: &F, key: &'static str, default: Duration) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::InvalidValue {
            key,
            expected: "a positive number of seconds",
            value: raw,
        }),
    }
}

fn flag_or<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            expected: "a boolean",
            value: raw,
        }),
    }
}

fn split_list(raw: Option<String>, separator: &str) -> Vec<String> {
    raw.map(|v| {
        v.split(separator)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = load(&[]).expect("defaults load");
        assert_eq!(config.shell, "/bin/sh");
        assert_eq!(config.command_timeout, Duration::from_secs(30));
        assert_eq!(config.script_timeout, Duration::from_secs(30));
        assert_eq!(config.install_timeout, Duration::from_secs(300));
        assert!(config.allow_remediation);
        assert!(config.auto_sudo);
        assert_eq!(config.package_manager, "apt-get");
        assert_eq!(config.c_compiler, "gcc");
        assert!(config.script_dir.is_none());
        assert!(!config.scan_model_text);
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("EXEC_SHELL", "/bin/bash"),
            ("COMMAND_TIMEOUT_SECS", "5"),
            ("INSTALL_TIMEOUT_SECS", "600"),
            ("ALLOW_REMEDIATION", "no"),
            ("AUTO_SUDO", "FALSE"),
            ("PACKAGE_MANAGER", "apt"),
            ("SCRIPT_TMP_DIR", "/var/tmp/shellpilot"),
            ("MISSING_COMMAND_PHRASES", "befehl nicht gefunden, introuvable"),
            ("SCAN_MODEL_TEXT", "1"),
        ])
        .expect("valid config");

        assert_eq!(config.shell, "/bin/bash");
        assert_eq!(config.command_timeout, Duration::from_secs(5));
        assert_eq!(config.install_timeout, Duration::from_secs(600));
        assert!(!config.allow_remediation);
        assert!(!config.auto_sudo);
        assert_eq!(config.package_manager, "apt");
        assert_eq!(
            config.script_dir.as_deref(),
            Some(std::path::Path::new("/var/tmp/shellpilot"))
        );
        assert_eq!(
            config.missing_command_phrases,
            vec!["befehl nicht gefunden", "introuvable"]
        );
        assert!(config.scan_model_text);
    }

    #[test]
    fn patterns_split_on_double_semicolon() {
        let config = load(&[(
            "MISSING_COMMAND_PATTERNS",
            r"([\w-]+): Befehl nicht gefunden;; commande ([\w-]+) introuvable",
        )])
        .expect("valid patterns");
        assert_eq!(config.missing_command_patterns.len(), 2);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = load(&[("SCRIPT_TIMEOUT_SECS", "0")]);
        assert_matches!(
            err,
            Err(ConfigError::InvalidValue {
                key: "SCRIPT_TIMEOUT_SECS",
                ..
            })
        );
    }

    #[test]
    fn garbage_flag_is_rejected() {
        let err = load(&[("AUTO_SUDO", "maybe")]);
        assert_matches!(err, Err(ConfigError::InvalidValue { key: "AUTO_SUDO", .. }));
    }

    #[test]
    fn invalid_pattern_fails_at_load() {
        let err = load(&[("MISSING_COMMAND_PATTERNS", "(unclosed")]);
        assert_matches!(err, Err(ConfigError::Pattern(_)));
    }
}
