//! Pipeline orchestrator: registers stages, wraps them in hook chains, and
//! runs them in order.
//!
//! Per stage, a run does:
//!
//! 1. Before-hooks in chain order. The first falsy outcome vetoes the stage
//!    and its after-hooks; the run moves on to the next stage.
//! 2. The stage itself, with parameters bound from its own map. A non-zero
//!    status, a binding error, or an `Err` is a stage failure. Under
//!    [`FailurePolicy::Abort`] a failure ends the run.
//! 3. After-hooks, only when the stage succeeded. A veto here only cuts the
//!    after-chain short.
//!
//! Every run starts by reloading all bound hook directories.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use hookline_core::error::AppError;
use serde::Serialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::hooks::{
    HookBindingStore, HookDirectorySpec, HookDispatcher, HookInvocation, HookPosition,
};
use crate::loader::HookLoader;
use crate::params::{ParamMap, bind};
use crate::stage::{FailurePolicy, Stage, StageOutcome};

/// A registered stage with its parameter map and failure policy.
#[derive(Debug, Clone)]
pub struct StageEntry {
    stage: Arc<dyn Stage>,
    params: ParamMap,
    policy: FailurePolicy,
}

impl StageEntry {
    /// The stage.
    pub fn stage(&self) -> &Arc<dyn Stage> {
        &self.stage
    }

    /// Stage name.
    pub fn name(&self) -> &str {
        self.stage.name()
    }

    /// Values the stage's parameters are bound against.
    pub fn params(&self) -> &ParamMap {
        &self.params
    }

    /// What a failure of this stage does to the run.
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }
}

/// Where the pipeline is in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    /// Not running.
    Idle,
    /// Reloading hook directories.
    Refreshing,
    /// Executing the stage at `index`.
    Running {
        /// Index of the current stage.
        index: usize,
    },
    /// The last run stopped at a failed `Abort` stage.
    Aborted,
}

/// How a stage fared in a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageStatus {
    /// The stage ran and returned status 0.
    Completed,
    /// A before-hook vetoed the stage.
    Vetoed {
        /// The vetoing hook.
        hook: String,
    },
    /// The stage could not be bound, returned an error, or a non-zero status.
    Failed {
        /// Status returned by the stage, when it ran to completion.
        status_code: Option<i32>,
        /// Failure detail.
        reason: String,
    },
    /// An earlier stage aborted the run.
    NotRun,
}

/// Per-stage entry of a [`RunReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    /// Stage name.
    pub stage: String,
    /// Result.
    pub status: StageStatus,
    /// What the stage returned, when it returned.
    pub outcome: Option<StageOutcome>,
    /// Hooks that ran, before-hooks first.
    pub hooks: Vec<HookInvocation>,
    /// Wall time spent on the stage and its hooks.
    pub duration_ms: u64,
}

impl StageReport {
    fn not_run(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            status: StageStatus::NotRun,
            outcome: None,
            hooks: Vec::new(),
            duration_ms: 0,
        }
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: Uuid,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// One entry per registered stage, in order.
    pub stages: Vec<StageReport>,
    /// Stage whose failure aborted the run.
    pub aborted_at: Option<String>,
}

impl RunReport {
    /// Report for `stage`.
    pub fn stage(&self, stage: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.stage == stage)
    }

    /// Whether the run was cut short.
    pub fn is_aborted(&self) -> bool {
        self.aborted_at.is_some()
    }

    /// Number of stages with the given status kind.
    pub fn count(&self, matches: impl Fn(&StageStatus) -> bool) -> usize {
        self.stages.iter().filter(|s| matches(&s.status)).count()
    }
}

/// Ordered stages, their hook bindings, and the shared hook context.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<StageEntry>,
    bindings: HookBindingStore,
    loader: HookLoader,
    dispatcher: HookDispatcher,
    context: ParamMap,
    state: PipelineState,
}

impl Pipeline {
    /// Creates an empty pipeline that loads hooks through `loader`.
    pub fn new(loader: HookLoader) -> Self {
        Self {
            stages: Vec::new(),
            bindings: HookBindingStore::new(),
            loader,
            dispatcher: HookDispatcher::new(),
            context: ParamMap::new(),
            state: PipelineState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The hook loader.
    pub fn loader(&self) -> &HookLoader {
        &self.loader
    }

    /// Mutable access to the hook loader, for targeted loads.
    pub fn loader_mut(&mut self) -> &mut HookLoader {
        &mut self.loader
    }

    // ── Stage registration ───────────────────────────────────────

    /// Appends a stage.
    ///
    /// Re-adding the same stage instance is ignored. A different stage with
    /// a registered name is a configuration error.
    pub fn append(&mut self, stage: Arc<dyn Stage>) -> Result<(), AppError> {
        self.append_with_policy(stage, FailurePolicy::default())
    }

    /// Appends a stage with the given failure policy.
    pub fn append_with_policy(
        &mut self,
        stage: Arc<dyn Stage>,
        policy: FailurePolicy,
    ) -> Result<(), AppError> {
        let index = self.stages.len();
        self.insert_with_policy(index, stage, policy)
    }

    /// Inserts a stage at `index`, clamped to the stage count.
    pub fn insert(&mut self, index: usize, stage: Arc<dyn Stage>) -> Result<(), AppError> {
        self.insert_with_policy(index, stage, FailurePolicy::default())
    }

    /// Inserts a stage at `index` with the given failure policy.
    pub fn insert_with_policy(
        &mut self,
        index: usize,
        stage: Arc<dyn Stage>,
        policy: FailurePolicy,
    ) -> Result<(), AppError> {
        if !self.admit(&stage)? {
            return Ok(());
        }

        let index = index.min(self.stages.len());
        self.bindings.register_stage(stage.name());
        info!(stage = %stage.name(), index = index, policy = ?policy, "Stage registered");

        self.stages.insert(
            index,
            StageEntry {
                stage,
                params: ParamMap::new(),
                policy,
            },
        );
        Ok(())
    }

    /// Checks a stage before registration. `Ok(false)` means it is already
    /// registered.
    fn admit(&self, stage: &Arc<dyn Stage>) -> Result<bool, AppError> {
        let name = stage.name();
        if name.trim().is_empty() {
            return Err(AppError::configuration("Stage name must not be empty"));
        }
        stage
            .params()
            .validate()
            .map_err(|e| AppError::configuration(format!("Stage '{name}': {}", e.message)))?;

        match self.stages.iter().find(|e| e.name() == name) {
            Some(existing) if Arc::ptr_eq(&existing.stage, stage) => {
                debug!(stage = %name, "Stage already registered, ignoring");
                Ok(false)
            }
            Some(_) => Err(AppError::configuration(format!(
                "A different stage named '{name}' is already registered"
            ))),
            None => Ok(true),
        }
    }

    /// Index of the stage named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.stages.iter().position(|e| e.name() == name)
    }

    /// Index of this exact stage instance.
    pub fn position_of(&self, stage: &Arc<dyn Stage>) -> Option<usize> {
        self.stages.iter().position(|e| Arc::ptr_eq(&e.stage, stage))
    }

    /// Removes the stage named `name` along with its hook bindings.
    pub fn remove(&mut self, name: &str) -> Result<Arc<dyn Stage>, AppError> {
        let index = self
            .index_of(name)
            .ok_or_else(|| AppError::configuration(format!("Unknown stage '{name}'")))?;
        Ok(self.take(index))
    }

    /// Removes the stage at `index`, or the last one when `None`.
    pub fn pop(&mut self, index: Option<usize>) -> Result<Arc<dyn Stage>, AppError> {
        let index = match index {
            Some(i) if i < self.stages.len() => i,
            Some(i) => {
                return Err(AppError::configuration(format!(
                    "Stage index {i} out of range ({} stages)",
                    self.stages.len()
                )));
            }
            None => self
                .stages
                .len()
                .checked_sub(1)
                .ok_or_else(|| AppError::configuration("Pop from an empty pipeline"))?,
        };
        Ok(self.take(index))
    }

    fn take(&mut self, index: usize) -> Arc<dyn Stage> {
        let entry = self.stages.remove(index);
        self.bindings.remove_stage(entry.name());
        info!(stage = %entry.name(), "Stage removed");
        entry.stage
    }

    /// Stage names in execution order.
    pub fn stage_names(&self) -> Vec<String> {
        self.stages.iter().map(|e| e.name().to_string()).collect()
    }

    /// Registered stages in execution order.
    pub fn stages(&self) -> &[StageEntry] {
        &self.stages
    }

    /// Merges `params` into the stage's parameter map.
    pub fn set_stage_params(&mut self, name: &str, params: ParamMap) -> Result<(), AppError> {
        self.entry_mut(name)?.params.extend(params);
        Ok(())
    }

    /// Sets what a failure of `name` does to the run.
    pub fn set_failure_policy(&mut self, name: &str, policy: FailurePolicy) -> Result<(), AppError> {
        self.entry_mut(name)?.policy = policy;
        Ok(())
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut StageEntry, AppError> {
        self.stages
            .iter_mut()
            .find(|e| e.name() == name)
            .ok_or_else(|| AppError::configuration(format!("Unknown stage '{name}'")))
    }

    // ── Hook context and bindings ────────────────────────────────

    /// Replaces the context every hook is bound against.
    pub fn set_context(&mut self, context: ParamMap) {
        self.context = context;
    }

    /// Merges values into the hook context.
    pub fn extend_context(&mut self, values: ParamMap) {
        self.context.extend(values);
    }

    /// The hook context.
    pub fn context(&self) -> &ParamMap {
        &self.context
    }

    /// Binds a hook directory to `stage`. `position` defaults to before.
    pub fn bind_hooks(
        &mut self,
        stage: &str,
        directory: impl Into<PathBuf>,
        recursive: bool,
        position: Option<HookPosition>,
    ) -> Result<(), AppError> {
        self.bindings.bind(stage, directory, recursive, position)
    }

    /// Unbinds one hook directory, or all of them at `position`.
    pub fn unbind_hooks(&mut self, stage: &str, directory: Option<&Path>, position: HookPosition) {
        self.bindings.unbind(stage, directory, position);
    }

    /// Directories bound to `stage` at `position`.
    pub fn hook_specs(&self, stage: &str, position: HookPosition) -> Vec<HookDirectorySpec> {
        self.bindings.specs(stage, position)
    }

    /// Reloads every bound hook directory.
    pub fn refresh(&mut self) {
        self.state = PipelineState::Refreshing;
        self.bindings.refresh(&self.loader);
        self.state = PipelineState::Idle;
    }

    /// `[before…, stage, after…]` as of a fresh reload. Empty for an
    /// unknown stage.
    pub fn call_chain(&mut self, stage: &str) -> Vec<String> {
        self.refresh();
        self.chain_of(stage)
    }

    /// Call chains of every stage, from one reload.
    pub fn call_chains(&mut self) -> Vec<(String, Vec<String>)> {
        self.refresh();
        self.stage_names()
            .into_iter()
            .map(|name| {
                let chain = self.chain_of(&name);
                (name, chain)
            })
            .collect()
    }

    fn chain_of(&self, stage: &str) -> Vec<String> {
        if self.index_of(stage).is_none() {
            return Vec::new();
        }
        let names = |position: HookPosition| {
            self.bindings
                .hooks(stage, position)
                .into_iter()
                .map(|u| u.name().to_string())
        };
        names(HookPosition::Before)
            .chain(std::iter::once(stage.to_string()))
            .chain(names(HookPosition::After))
            .collect()
    }

    // ── Execution ────────────────────────────────────────────────

    /// Runs every stage once.
    ///
    /// Stage and hook failures are recorded in the report, never returned.
    pub async fn run(&mut self) -> RunReport {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(run_id = %run_id, stages = self.stages.len(), "Pipeline run started");

        self.refresh();

        let entries = self.stages.clone();
        let mut reports = Vec::with_capacity(entries.len());
        let mut aborted_at = None;

        for (index, entry) in entries.iter().enumerate() {
            if aborted_at.is_some() {
                reports.push(StageReport::not_run(entry.name()));
                continue;
            }

            self.state = PipelineState::Running { index };
            let report = self.run_stage(entry).await;

            if matches!(report.status, StageStatus::Failed { .. })
                && entry.policy == FailurePolicy::Abort
            {
                error!(run_id = %run_id, stage = %entry.name(), "Stage failed, aborting run");
                aborted_at = Some(entry.name().to_string());
            }
            reports.push(report);
        }

        self.state = if aborted_at.is_some() {
            PipelineState::Aborted
        } else {
            PipelineState::Idle
        };

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages: reports,
            aborted_at,
        };

        info!(
            run_id = %run_id,
            completed = report.count(|s| matches!(s, StageStatus::Completed)),
            vetoed = report.count(|s| matches!(s, StageStatus::Vetoed { .. })),
            failed = report.count(|s| matches!(s, StageStatus::Failed { .. })),
            aborted = report.is_aborted(),
            "Pipeline run finished"
        );

        report
    }

    async fn run_stage(&self, entry: &StageEntry) -> StageReport {
        let start = Instant::now();
        let name = entry.name();
        let mut hooks = Vec::new();

        let has_hooks = self.bindings.has_hooks(name);

        if has_hooks {
            let before = self.bindings.hooks(name, HookPosition::Before);
            let result = self
                .dispatcher
                .dispatch(name, HookPosition::Before, &before, &self.context)
                .await;
            hooks.extend(result.executed);

            if let Some(hook) = result.halted_by {
                info!(stage = %name, hook = %hook, "Stage vetoed by before-hook");
                return StageReport {
                    stage: name.to_string(),
                    status: StageStatus::Vetoed { hook },
                    outcome: None,
                    hooks,
                    duration_ms: start.elapsed().as_millis() as u64,
                };
            }
        }

        let (status, outcome) = self.call_stage(entry).await;

        if has_hooks && status == StageStatus::Completed {
            let after = self.bindings.hooks(name, HookPosition::After);
            let result = self
                .dispatcher
                .dispatch(name, HookPosition::After, &after, &self.context)
                .await;
            hooks.extend(result.executed);
        }

        StageReport {
            stage: name.to_string(),
            status,
            outcome,
            hooks,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn call_stage(&self, entry: &StageEntry) -> (StageStatus, Option<StageOutcome>) {
        let name = entry.name();

        let args = match bind(name, entry.stage.params(), &entry.params) {
            Ok(args) => args,
            Err(e) => {
                warn!(stage = %name, error = %e, "Stage arguments could not be bound");
                return (
                    StageStatus::Failed {
                        status_code: None,
                        reason: e.to_string(),
                    },
                    None,
                );
            }
        };

        match entry.stage.call(&args).await {
            Ok(outcome) if outcome.is_success() => {
                debug!(stage = %name, "Stage completed");
                (StageStatus::Completed, Some(outcome))
            }
            Ok(outcome) => {
                warn!(
                    stage = %name,
                    status_code = outcome.status_code,
                    message = ?outcome.message,
                    "Stage returned non-zero status"
                );
                let reason = outcome
                    .message
                    .clone()
                    .unwrap_or_else(|| format!("exited with status {}", outcome.status_code));
                (
                    StageStatus::Failed {
                        status_code: Some(outcome.status_code),
                        reason,
                    },
                    Some(outcome),
                )
            }
            Err(e) => {
                warn!(stage = %name, error = %e, "Stage failed");
                (
                    StageStatus::Failed {
                        status_code: None,
                        reason: e.to_string(),
                    },
                    None,
                )
            }
        }
    }
}
