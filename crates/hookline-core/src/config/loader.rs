//! Hook loader configuration.

use serde::{Deserialize, Serialize};

/// How hook units are turned into executable code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderStrategy {
    /// Units are script files run through an interpreter.
    Script,
    /// Units are shared libraries (requires the `dynamic` feature).
    Dynamic,
}

/// Hook loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Load strategy.
    #[serde(default = "default_strategy")]
    pub strategy: LoaderStrategy,
    /// Interpreter used by the script strategy.
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    /// Recognised source suffix, without the leading dot. Defaults to the
    /// strategy's own suffix when unset.
    #[serde(default)]
    pub extension: Option<String>,
    /// File stem of the package-marker file. Never treated as a hook; a
    /// directory containing it can be loaded as a single unit.
    #[serde(default = "default_package_marker")]
    pub package_marker: String,
    /// Per-invocation deadline for script hooks. Unset means no deadline.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            interpreter: default_interpreter(),
            extension: None,
            package_marker: default_package_marker(),
            timeout_seconds: None,
        }
    }
}

fn default_strategy() -> LoaderStrategy {
    LoaderStrategy::Script
}

fn default_interpreter() -> String {
    "sh".to_string()
}

fn default_package_marker() -> String {
    "__init__".to_string()
}
