//! The `run` capability every hook unit exposes, plus a closure-backed
//! implementation for in-process hooks.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use hookline_core::AppResult;
use serde_json::Value;

use crate::params::{BoundArgs, ParamSchema};

/// Executable entry point of a loaded hook unit.
///
/// The returned value is interpreted for truthiness by the dispatcher: a
/// falsy outcome vetoes the rest of the chain.
#[async_trait]
pub trait HookUnit: Send + Sync + std::fmt::Debug {
    /// Declared parameters of `run`, resolved against the execution context.
    fn params(&self) -> &ParamSchema;

    /// Runs the hook.
    async fn run(&self, args: &BoundArgs) -> AppResult<Value>;
}

type BoxedRun =
    Arc<dyn Fn(BoundArgs) -> Pin<Box<dyn Future<Output = AppResult<Value>> + Send>> + Send + Sync>;

/// A hook unit backed by a closure.
pub struct ClosureUnit {
    schema: ParamSchema,
    run: BoxedRun,
}

impl std::fmt::Debug for ClosureUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureUnit")
            .field("schema", &self.schema)
            .field("run", &"<closure>")
            .finish()
    }
}

impl ClosureUnit {
    /// Creates a unit from an async closure.
    pub fn new<F, Fut>(schema: ParamSchema, run: F) -> Self
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<Value>> + Send + 'static,
    {
        Self {
            schema,
            run: Arc::new(move |args| Box::pin(run(args))),
        }
    }

    /// Creates a unit from a synchronous closure.
    pub fn from_fn<F>(schema: ParamSchema, run: F) -> Self
    where
        F: Fn(&BoundArgs) -> AppResult<Value> + Send + Sync + 'static,
    {
        let run = Arc::new(run);
        Self::new(schema, move |args| {
            let run = Arc::clone(&run);
            async move { run(&args) }
        })
    }

    /// A unit that takes no parameters and always returns `outcome`.
    pub fn constant(outcome: Value) -> Self {
        Self::from_fn(ParamSchema::new(), move |_| Ok(outcome.clone()))
    }
}

#[async_trait]
impl HookUnit for ClosureUnit {
    fn params(&self) -> &ParamSchema {
        &self.schema
    }

    async fn run(&self, args: &BoundArgs) -> AppResult<Value> {
        (self.run)(args.clone()).await
    }
}
