//! # hookline-plugin
//!
//! Extensible execution pipeline. Provides:
//!
//! - Hook unit discovery and loading with content-hash hot reload
//! - Pluggable load strategies (scripts, in-process closures, and shared
//!   libraries behind the `dynamic` feature)
//! - Per-stage, per-position hook directory bindings
//! - Parameter binding from declared schemas
//! - A sequential stage orchestrator with veto and abort semantics

pub mod builder;
pub mod error;
pub mod hooks;
pub mod loader;
pub mod params;
pub mod pipeline;
pub mod prelude;
pub mod registry;
pub mod stage;
pub mod traits;

mod process;

pub use builder::{build_pipeline, build_pipeline_with, strategy_from_config};
pub use error::{BindError, LoaderError};
pub use hooks::{HookBindingStore, HookDispatcher, HookPosition};
pub use loader::{HookLoader, LoadOutcome};
pub use pipeline::{Pipeline, PipelineState, RunReport, StageReport, StageStatus};
pub use registry::{CodeUnit, UnitRegistry};
