//! Assembles a [`Pipeline`] from configuration.

use std::sync::Arc;

use hookline_core::config::AppConfig;
use hookline_core::config::loader::{LoaderConfig, LoaderStrategy};
use hookline_core::config::pipeline::StageConfig;
use hookline_core::error::AppError;
use tracing::info;

use crate::hooks::HookPosition;
use crate::loader::{HookLoader, ScriptLoader, UnitLoader};
use crate::params::ParamSchema;
use crate::pipeline::Pipeline;
use crate::stage::{CommandStage, FailurePolicy, Stage};

/// Picks the load strategy named in `[loader]`.
pub fn strategy_from_config(config: &LoaderConfig) -> Result<Arc<dyn UnitLoader>, AppError> {
    match config.strategy {
        LoaderStrategy::Script => Ok(Arc::new(ScriptLoader::from_config(config))),
        #[cfg(feature = "dynamic")]
        LoaderStrategy::Dynamic => {
            let mut loader = crate::loader::DynamicLoader::default();
            if let Some(ref extension) = config.extension {
                loader = loader.with_extension(extension);
            }
            Ok(Arc::new(loader))
        }
        #[cfg(not(feature = "dynamic"))]
        LoaderStrategy::Dynamic => Err(AppError::configuration(
            "loader.strategy 'dynamic' requires the 'dynamic' feature",
        )),
    }
}

/// Builds the pipeline described by `config`, with a fresh loader.
pub fn build_pipeline(config: &AppConfig) -> Result<Pipeline, AppError> {
    let loader = HookLoader::new(strategy_from_config(&config.loader)?);
    build_pipeline_with(config, loader)
}

/// Builds the pipeline described by `config` around an existing loader.
pub fn build_pipeline_with(config: &AppConfig, loader: HookLoader) -> Result<Pipeline, AppError> {
    let mut pipeline = Pipeline::new(loader);
    pipeline.set_context(config.context.clone());

    for stage_config in &config.stages {
        add_stage(&mut pipeline, stage_config)?;
    }

    info!(
        stages = ?pipeline.stage_names(),
        context_keys = config.context.len(),
        "Pipeline assembled"
    );
    Ok(pipeline)
}

fn add_stage(pipeline: &mut Pipeline, config: &StageConfig) -> Result<(), AppError> {
    let schema = ParamSchema::from_parts(&config.declared, &config.defaults)
        .map_err(|e| AppError::configuration(format!("Stage '{}': {}", config.name, e.message)))?;

    let policy = config
        .failure_policy
        .as_deref()
        .map_or(Ok(FailurePolicy::default()), |p| p.parse())?;

    let stage: Arc<dyn Stage> = Arc::new(
        CommandStage::new(&config.name, &config.command)
            .with_args(config.args.iter().cloned())
            .with_params(schema),
    );
    pipeline.append_with_policy(stage, policy)?;

    pipeline.set_stage_params(&config.name, config.params.clone())?;

    for hook in &config.hooks {
        let position = HookPosition::resolve(hook.position.as_deref())?;
        pipeline.bind_hooks(&config.name, &hook.directory, hook.recursive, Some(position))?;
    }

    Ok(())
}
