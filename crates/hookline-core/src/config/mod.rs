//! Daemon configuration schemas.
//!
//! The root [`AppConfig`] is deserialized from a TOML file through the
//! `config` crate, with `HOOKLINE__`-prefixed environment variables layered
//! on top. The core library never reads configuration itself; the daemon
//! turns an `AppConfig` into a pipeline.

pub mod loader;
pub mod logging;
pub mod pipeline;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use self::loader::LoaderConfig;
use self::logging::LoggingConfig;
use self::pipeline::{PipelineConfig, StageConfig};

use crate::error::AppError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Hook loader settings.
    #[serde(default)]
    pub loader: LoaderConfig,
    /// Supervisory loop settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Shared parameter map handed to every hook invocation.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
    /// Stages in execution order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

impl AppConfig {
    /// Load configuration from a TOML file plus the environment overlay.
    ///
    /// A missing file is an error; use [`AppConfig::default`] for an empty
    /// pipeline.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let config = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("HOOKLINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| {
                AppError::configuration(format!(
                    "Failed to build config from '{}': {e}",
                    path.display()
                ))
            })?;

        let app: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        app.validate()?;
        Ok(app)
    }

    /// Checks invariants the schema alone cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.pipeline.interval_seconds == 0 {
            return Err(AppError::configuration(
                "pipeline.interval_seconds must be greater than zero",
            ));
        }

        let mut seen = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(AppError::configuration("stage name must not be empty"));
            }
            if stage.command.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "stage '{}' has an empty command",
                    stage.name
                )));
            }
            if !seen.insert(stage.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "stage '{}' is declared more than once",
                    stage.name
                )));
            }
            for key in stage.defaults.keys() {
                if !stage.declared.contains(key) {
                    return Err(AppError::configuration(format!(
                        "stage '{}' has a default for undeclared parameter '{}'",
                        stage.name, key
                    )));
                }
            }
            if let Some(policy) = stage.failure_policy.as_deref()
                && !matches!(policy, "continue" | "abort")
            {
                return Err(AppError::configuration(format!(
                    "stage '{}' has failure_policy '{policy}', expected 'continue' or 'abort'",
                    stage.name
                )));
            }
            for hook in &stage.hooks {
                if let Some(position) = hook.position.as_deref()
                    && !matches!(position, "before" | "after")
                {
                    return Err(AppError::configuration(format!(
                        "stage '{}' binds '{}' at position '{position}', expected 'before' or 'after'",
                        stage.name, hook.directory
                    )));
                }
            }
        }

        Ok(())
    }
}
