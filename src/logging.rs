//! Logging setup through `tracing`.
//!
//! The library itself only emits `tracing` events (pool hand-offs at
//! `debug`, decode failures at `warn`, recovered sessions at `info`).
//! Binaries that want to see them call [`init_logging`] once at startup.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HarnessError, Result};

/// Environment variable that overrides the level passed to [`init_logging`].
pub const LOG_ENV: &str = "LLM_HARNESS_LOG";

/// Log levels, from least to most verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Level {
        match self {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }

    /// The filter directive enabling this level for this crate only.
    pub fn directive(self) -> String {
        format!("llm_harness={}", self.to_tracing_level())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = HarnessError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(HarnessError::InvalidConfig(format!(
                "unknown log level '{}'",
                other
            ))),
        }
    }
}

/// Install a formatting subscriber at `level`.
///
/// `LLM_HARNESS_LOG`, when set to a valid filter, takes precedence. Returns
/// `false` if a global subscriber was already installed, in which case the
/// existing one is left alone.
///
/// ```no_run
/// use llm_harness::logging::{init_logging, LogLevel};
///
/// init_logging(LogLevel::Debug);
/// tracing::debug!("visible");
/// ```
pub fn init_logging(level: LogLevel) -> bool {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level.directive()));
    let installed = install(filter);
    if installed {
        tracing::debug!(?level, "logging initialized");
    }
    installed
}

/// Install a formatting subscriber with a full filter expression such as
/// `"llm_harness=debug,reqwest=warn"`.
pub fn init_logging_with_filter(filter: &str) -> Result<bool> {
    let env_filter = EnvFilter::try_new(filter).map_err(|e| {
        HarnessError::InvalidConfig(format!("invalid log filter '{}': {}", filter, e))
    })?;
    Ok(install(env_filter))
}

fn install(filter: EnvFilter) -> bool {
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .is_ok()
}
