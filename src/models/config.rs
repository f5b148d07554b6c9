//! Engine Configuration
//!
//! Settings for the control-flow manager: repair ceiling, dispatcher limits
//! and validator switches. Loadable from TOML; every field has a default so a
//! partial file is valid.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use toolgate_core::error::{CoreError, CoreResult};
use toolgate_tools::executor::{ExecutorConfig, DEFAULT_MAX_CONCURRENCY};
use toolgate_tools::validator::ValidatorConfig;

const DEFAULT_MAX_REPAIR_ATTEMPTS: u32 = 2;
const DEFAULT_MAX_TOOL_ITERATIONS: u32 = 5;
const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;

/// Upper bound accepted by `validate`; anything larger is almost certainly a typo.
const MAX_CONCURRENCY_LIMIT: usize = 1024;

/// Control-flow manager configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ControlFlowConfig {
    /// Validation failures allowed per call id before it is rejected terminally
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: u32,
    /// Default round budget for the auto-repair driver
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: u32,
    /// Dispatcher permit pool size
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    /// Per-call timeout in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enable_validation: bool,
    #[serde(default = "default_true")]
    pub enable_parallel_execution: bool,
    /// Include the live parameter schema in repair messages
    #[serde(default = "default_true")]
    pub detailed_repair_messages: bool,
    #[serde(default)]
    pub validator: ValidatorConfig,
}

fn default_max_repair_attempts() -> u32 {
    DEFAULT_MAX_REPAIR_ATTEMPTS
}

fn default_max_tool_iterations() -> u32 {
    DEFAULT_MAX_TOOL_ITERATIONS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_tool_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

fn default_true() -> bool {
    true
}

impl Default for ControlFlowConfig {
    fn default() -> Self {
        Self {
            max_repair_attempts: default_max_repair_attempts(),
            max_tool_iterations: default_max_tool_iterations(),
            max_concurrency: default_max_concurrency(),
            tool_timeout_secs: default_tool_timeout_secs(),
            enable_validation: true,
            enable_parallel_execution: true,
            detailed_repair_messages: true,
            validator: ValidatorConfig::default(),
        }
    }
}

/// Partial configuration update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControlFlowConfigUpdate {
    pub max_repair_attempts: Option<u32>,
    pub max_tool_iterations: Option<u32>,
    pub max_concurrency: Option<usize>,
    pub tool_timeout_secs: Option<u64>,
    pub enable_validation: Option<bool>,
    pub enable_parallel_execution: Option<bool>,
    pub detailed_repair_messages: Option<bool>,
    pub coerce_types: Option<bool>,
    pub reject_unknown_fields: Option<bool>,
}

impl ControlFlowConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(content: &str) -> CoreResult<Self> {
        toml::from_str(content).map_err(|e| CoreError::config(format!("invalid control-flow config: {}", e)))
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    /// Serialize to TOML.
    pub fn to_toml_string(&self) -> CoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| CoreError::config(e.to_string()))
    }

    /// Replace zero limits with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.max_repair_attempts == 0 {
            self.max_repair_attempts = DEFAULT_MAX_REPAIR_ATTEMPTS;
        }
        if self.max_tool_iterations == 0 {
            self.max_tool_iterations = DEFAULT_MAX_TOOL_ITERATIONS;
        }
        if self.max_concurrency == 0 {
            self.max_concurrency = DEFAULT_MAX_CONCURRENCY;
        }
        if self.tool_timeout_secs == 0 {
            self.tool_timeout_secs = DEFAULT_TOOL_TIMEOUT_SECS;
        }
        self
    }

    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: ControlFlowConfigUpdate) {
        if let Some(max) = update.max_repair_attempts {
            self.max_repair_attempts = max;
        }
        if let Some(max) = update.max_tool_iterations {
            self.max_tool_iterations = max;
        }
        if let Some(max) = update.max_concurrency {
            self.max_concurrency = max;
        }
        if let Some(secs) = update.tool_timeout_secs {
            self.tool_timeout_secs = secs;
        }
        if let Some(enabled) = update.enable_validation {
            self.enable_validation = enabled;
        }
        if let Some(enabled) = update.enable_parallel_execution {
            self.enable_parallel_execution = enabled;
        }
        if let Some(detailed) = update.detailed_repair_messages {
            self.detailed_repair_messages = detailed;
        }
        if let Some(coerce) = update.coerce_types {
            self.validator.coerce_types = coerce;
        }
        if let Some(reject) = update.reject_unknown_fields {
            self.validator.reject_unknown_fields = reject;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_concurrency > MAX_CONCURRENCY_LIMIT {
            return Err(CoreError::config(format!(
                "max_concurrency cannot exceed {}",
                MAX_CONCURRENCY_LIMIT
            )));
        }
        if self.tool_timeout_secs > 24 * 60 * 60 {
            return Err(CoreError::config("tool_timeout_secs cannot exceed one day"));
        }
        if self.max_tool_iterations > 100 {
            return Err(CoreError::config("max_tool_iterations cannot exceed 100"));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    /// Dispatcher limits derived from this configuration.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_concurrency: self.max_concurrency,
            timeout: self.tool_timeout(),
        }
        .normalized()
    }
}
