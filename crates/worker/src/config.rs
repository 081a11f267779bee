//! Worker process settings.

use shellpilot_core::ConfigError;

/// Default number of requests executed concurrently.
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Log output format for the stderr subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Upper bound on in-flight requests.
    pub max_concurrency: usize,
    pub log_format: LogFormat,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            log_format: LogFormat::Text,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default |
    /// |--------------------------|---------|
    /// | `WORKER_MAX_CONCURRENCY` | `8`     |
    /// | `LOG_FORMAT`             | `text`  |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let max_concurrency = match lookup("WORKER_MAX_CONCURRENCY") {
            None => DEFAULT_MAX_CONCURRENCY,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "WORKER_MAX_CONCURRENCY",
                        expected: "a positive integer",
                        value: raw,
                    })
                }
            },
        };

        let log_format = match lookup("LOG_FORMAT") {
            None => LogFormat::Text,
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "" | "text" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "LOG_FORMAT",
                        expected: "'text' or 'json'",
                        value: raw,
                    })
                }
            },
        };

        Ok(Self {
            max_concurrency,
            log_format,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
