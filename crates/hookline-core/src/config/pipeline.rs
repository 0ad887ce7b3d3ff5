//! Pipeline, stage, and hook binding configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Supervisory loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Seconds to sleep between cycles.
    #[serde(default = "default_interval")]
    pub interval_seconds: u64,
    /// Rebuild the pipeline from configuration before every cycle instead of
    /// reusing one long-lived instance.
    #[serde(default = "default_true")]
    pub rebuild_each_cycle: bool,
    /// Stop after this many cycles. Unset means run until interrupted.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval(),
            rebuild_each_cycle: true,
            max_cycles: None,
        }
    }
}

/// A stage backed by an external command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageConfig {
    /// Unique stage name.
    pub name: String,
    /// Program to execute.
    pub command: String,
    /// Fixed command-line arguments.
    #[serde(default)]
    pub args: Vec<String>,
    /// `"continue"` or `"abort"`. Unset means `"continue"`.
    #[serde(default)]
    pub failure_policy: Option<String>,
    /// Declared parameters: names listed here are required unless a default
    /// is given in `defaults`.
    #[serde(default)]
    pub declared: Vec<String>,
    /// Defaults for declared parameters.
    #[serde(default)]
    pub defaults: HashMap<String, serde_json::Value>,
    /// Values supplied to the stage at call time.
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    /// Hook directories wrapped around this stage.
    #[serde(default)]
    pub hooks: Vec<HookBindingConfig>,
}

/// A hook directory bound to a stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookBindingConfig {
    /// Directory to scan for hook units.
    pub directory: String,
    /// Whether to descend into subdirectories.
    #[serde(default)]
    pub recursive: bool,
    /// `"before"` or `"after"`. Defaults to `"before"`.
    #[serde(default)]
    pub position: Option<String>,
}

fn default_interval() -> u64 {
    10
}

fn default_true() -> bool {
    true
}
