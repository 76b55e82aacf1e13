//! Logging bootstrap shared by the CLI and tests.
//!
//! The filter is taken from the `SBENCH_LOG` environment variable when set,
//! falling back to the configured default level. Output goes to stderr so
//! machine-readable payloads own stdout.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted for the log filter.
pub const LOG_ENV_VAR: &str = "SBENCH_LOG";

/// Logging configuration assembled at startup.
#[derive(Debug, Clone)]
pub struct LogConfig {
    default_level: String,
}

impl LogConfig {
    /// Build a config that defers to `SBENCH_LOG` with the given fallback.
    pub fn from_env(default_level: &str) -> Self {
        Self {
            default_level: default_level.to_string(),
        }
    }

    /// Override the fallback level (e.g. when `--verbose` is passed).
    #[must_use]
    pub fn with_level(mut self, level: &str) -> Self {
        self.default_level = level.to_string();
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_ENV_VAR)
            .unwrap_or_else(|_| EnvFilter::new(&self.default_level))
    }
}

/// Install the global subscriber. Safe to call more than once; later calls
/// are no-ops so tests can initialize freely.
pub fn init_logging(config: &LogConfig) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_writer(std::io::stderr)
        .try_init();
}
