//! Prelude for convenient imports.

pub use async_trait::async_trait;

pub use crate::hooks::{HookPosition, is_truthy};
pub use crate::loader::{Candidate, ClosureLoader, HookLoader, LoadOutcome, ScriptLoader, UnitLoader};
pub use crate::params::{BoundArgs, ParamMap, ParamSchema, bind};
pub use crate::pipeline::{Pipeline, RunReport, StageStatus};
pub use crate::stage::{ClosureStage, CommandStage, FailurePolicy, Stage, StageOutcome};
pub use crate::traits::{ClosureUnit, HookUnit};

#[cfg(feature = "dynamic")]
pub use crate::loader::DynamicLoader;
