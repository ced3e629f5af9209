//! Program-control configuration (`control.toml`).
//!
//! Every table is optional; a missing table takes its defaults.
//!
//! ```toml
//! [shared]
//! log_level = "info"
//! service_name = "cnc-program-control"
//!
//! [program]
//! optional_stop_enabled = false
//! directive_queue_depth = 32
//!
//! [notifier]
//! queue_depth = 16
//! alert_after_attempts = 5
//! retry_backoff_ms = 50
//! output = "stdout"
//!
//! [auxiliary]
//! shutdown_outputs = ["spindle", "coolant"]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cnc_common::config::{ConfigError, ConfigLoader, SharedConfig};
use cnc_common::consts::{
    DEFAULT_DIRECTIVE_QUEUE_DEPTH, DEFAULT_NOTIFY_ALERT_ATTEMPTS, DEFAULT_NOTIFY_BACKOFF_MS,
    DEFAULT_NOTIFY_QUEUE_DEPTH, MAX_AUXILIARY_OUTPUTS,
};
use serde::{Deserialize, Serialize};

/// Notifier output value meaning "write JSON lines to standard output".
pub const STDOUT_OUTPUT: &str = "stdout";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ControlConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub program: ProgramConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub auxiliary: AuxiliaryConfig,
}

/// `[program]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProgramConfig {
    /// Initial optional-stop flag. Off unless explicitly enabled.
    pub optional_stop_enabled: bool,
    /// Capacity of the normal directive channel. Producers block when full.
    pub directive_queue_depth: usize,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            optional_stop_enabled: false,
            directive_queue_depth: DEFAULT_DIRECTIVE_QUEUE_DEPTH,
        }
    }
}

/// `[notifier]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotifierConfig {
    pub queue_depth: usize,
    /// Consecutive failed attempts before retries are logged as errors.
    /// Delivery keeps retrying past this point.
    pub alert_after_attempts: u32,
    /// First retry backoff; doubles per attempt.
    pub retry_backoff_ms: u64,
    /// `"stdout"` or a file path for JSON-lines output.
    pub output: String,
}

impl NotifierConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// File path for the JSON-lines output, `None` for stdout.
    pub fn output_path(&self) -> Option<PathBuf> {
        if self.output.eq_ignore_ascii_case(STDOUT_OUTPUT) {
            None
        } else {
            Some(PathBuf::from(&self.output))
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_NOTIFY_QUEUE_DEPTH,
            alert_after_attempts: DEFAULT_NOTIFY_ALERT_ATTEMPTS,
            retry_backoff_ms: DEFAULT_NOTIFY_BACKOFF_MS,
            output: STDOUT_OUTPUT.to_string(),
        }
    }
}

/// `[auxiliary]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AuxiliaryConfig {
    /// Names of outputs switched off at program end, in order.
    pub shutdown_outputs: Vec<String>,
}

impl ControlConfig {
    /// Load and validate from a TOML file.
    pub fn load_validated(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate from a TOML string.
    pub fn from_toml_validated(content: &str) -> Result<Self, ConfigError> {
        let config = Self::from_toml(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.program.directive_queue_depth == 0 {
            return Err(invalid("program.directive_queue_depth must be > 0"));
        }
        if self.notifier.queue_depth == 0 {
            return Err(invalid("notifier.queue_depth must be > 0"));
        }
        if self.notifier.alert_after_attempts == 0 {
            return Err(invalid("notifier.alert_after_attempts must be >= 1"));
        }
        if self.notifier.output.trim().is_empty() {
            return Err(invalid("notifier.output cannot be empty"));
        }

        let outputs = &self.auxiliary.shutdown_outputs;
        if outputs.len() > MAX_AUXILIARY_OUTPUTS {
            return Err(invalid(&format!(
                "auxiliary.shutdown_outputs has {} entries, max {MAX_AUXILIARY_OUTPUTS}",
                outputs.len()
            )));
        }
        let mut seen = HashSet::new();
        for name in outputs {
            if name.trim().is_empty() {
                return Err(invalid("auxiliary.shutdown_outputs contains an empty name"));
            }
            if !seen.insert(name.as_str()) {
                return Err(invalid(&format!(
                    "auxiliary.shutdown_outputs lists '{name}' twice"
                )));
            }
        }
        Ok(())
    }
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
