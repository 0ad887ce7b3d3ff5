//! Hook dispatcher: runs one stage/position chain with veto semantics.
//!
//! - Hooks run one at a time in chain order.
//! - Each hook's declared parameters are bound against the shared context.
//! - The first hook whose outcome is falsy halts the chain. A hook that
//!   cannot be bound or whose `run` fails counts as falsy.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::definitions::{HookPosition, is_truthy};
use crate::params::{ParamMap, bind};
use crate::registry::CodeUnit;

/// One executed hook.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HookInvocation {
    /// Hook unit name.
    pub hook: String,
    /// Position it ran at.
    pub position: HookPosition,
    /// Returned value, when `run` completed.
    pub outcome: Option<Value>,
    /// Binding or execution error.
    pub error: Option<String>,
    /// Whether the outcome let the chain continue.
    pub passed: bool,
}

/// Aggregated result of dispatching one chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DispatchResult {
    /// Whether a hook vetoed the chain.
    pub halted: bool,
    /// Hook that vetoed.
    pub halted_by: Option<String>,
    /// Why it vetoed.
    pub halt_reason: Option<String>,
    /// Hooks that ran, in order, including the vetoing one.
    pub executed: Vec<HookInvocation>,
}

/// Stateless runner for hook chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct HookDispatcher;

impl HookDispatcher {
    /// Creates a dispatcher.
    pub fn new() -> Self {
        Self
    }

    /// Runs `hooks` for `stage` at `position` against `context`.
    pub async fn dispatch(
        &self,
        stage: &str,
        position: HookPosition,
        hooks: &[CodeUnit],
        context: &ParamMap,
    ) -> DispatchResult {
        let mut result = DispatchResult::default();
        if hooks.is_empty() {
            return result;
        }

        debug!(
            stage = %stage,
            position = %position,
            hook_count = hooks.len(),
            "Dispatching hooks"
        );

        for hook in hooks {
            let invocation = Self::invoke(stage, position, hook, context).await;
            let passed = invocation.passed;

            if !passed {
                let reason = match (&invocation.error, &invocation.outcome) {
                    (Some(error), _) => error.clone(),
                    (None, Some(outcome)) => format!("returned {outcome}"),
                    (None, None) => "no outcome".to_string(),
                };
                info!(
                    stage = %stage,
                    position = %position,
                    hook = %hook.name(),
                    reason = %reason,
                    "Hook vetoed the chain"
                );
                result.halted = true;
                result.halted_by = Some(hook.name().to_string());
                result.halt_reason = Some(reason);
            }

            result.executed.push(invocation);
            if !passed {
                break;
            }
        }

        result
    }

    async fn invoke(
        stage: &str,
        position: HookPosition,
        hook: &CodeUnit,
        context: &ParamMap,
    ) -> HookInvocation {
        let entry = hook.entry();
        let mut invocation = HookInvocation {
            hook: hook.name().to_string(),
            position,
            outcome: None,
            error: None,
            passed: false,
        };

        let args = match bind(hook.name(), entry.params(), context) {
            Ok(args) => args,
            Err(e) => {
                warn!(stage = %stage, hook = %hook.name(), error = %e, "Hook arguments could not be bound");
                invocation.error = Some(e.to_string());
                return invocation;
            }
        };

        match entry.run(&args).await {
            Ok(outcome) => {
                debug!(stage = %stage, hook = %hook.name(), outcome = %outcome, "Hook returned");
                invocation.passed = is_truthy(&outcome);
                invocation.outcome = Some(outcome);
            }
            Err(e) => {
                warn!(stage = %stage, hook = %hook.name(), error = %e, "Hook failed");
                invocation.error = Some(e.to_string());
            }
        }

        invocation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use hookline_core::error::AppError;
    use serde_json::json;

    use crate::params::ParamSchema;
    use crate::traits::ClosureUnit;

    fn unit(name: &str, inner: ClosureUnit) -> CodeUnit {
        CodeUnit::new(name, format!("/hooks/{name}.sh"), "h", Arc::new(inner))
    }

    fn counting(name: &str, outcome: Value, counter: &Arc<AtomicUsize>) -> CodeUnit {
        let counter = Arc::clone(counter);
        unit(
            name,
            ClosureUnit::from_fn(ParamSchema::new(), move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(outcome.clone())
            }),
        )
    }

    #[tokio::test]
    async fn test_falsy_hook_halts_chain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks = vec![
            counting("a", json!(true), &calls),
            counting("b", json!(0), &calls),
            counting("c", json!(true), &calls),
        ];

        let result = HookDispatcher::new()
            .dispatch("s", HookPosition::Before, &hooks, &ParamMap::new())
            .await;

        assert!(result.halted);
        assert_eq!(result.halted_by.as_deref(), Some("b"));
        assert_eq!(result.executed.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_all_truthy_runs_every_hook() {
        let calls = Arc::new(AtomicUsize::new(0));
        let hooks = vec![
            counting("a", json!("yes"), &calls),
            counting("b", json!([1]), &calls),
        ];

        let result = HookDispatcher::new()
            .dispatch("s", HookPosition::After, &hooks, &ParamMap::new())
            .await;

        assert!(!result.halted);
        assert_eq!(result.executed.len(), 2);
        assert!(result.executed.iter().all(|i| i.passed));
    }

    #[tokio::test]
    async fn test_missing_parameter_counts_as_falsy() {
        let hooks = vec![unit(
            "needs_t1",
            ClosureUnit::from_fn(ParamSchema::new().required("t1"), |_| Ok(json!(true))),
        )];

        let result = HookDispatcher::new()
            .dispatch("s", HookPosition::Before, &hooks, &ParamMap::new())
            .await;

        assert!(result.halted);
        let reason = result.halt_reason.unwrap();
        assert!(reason.contains("'t1'"), "{reason}");
    }

    #[tokio::test]
    async fn test_run_error_counts_as_falsy() {
        let hooks = vec![unit(
            "boom",
            ClosureUnit::from_fn(ParamSchema::new(), |_| Err(AppError::plugin("boom"))),
        )];

        let result = HookDispatcher::new()
            .dispatch("s", HookPosition::Before, &hooks, &ParamMap::new())
            .await;

        assert!(result.halted);
        assert!(result.executed[0].error.is_some());
        assert!(result.executed[0].outcome.is_none());
    }
}
