//! Stage routines: the units of work hooks wrap.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::AppResult;
use hookline_core::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

use crate::params::{BoundArgs, ParamSchema};
use crate::process::{self, ProcessSpec};

/// What a stage reports back. Zero status means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    /// Exit status; non-zero is a stage failure.
    pub status_code: i32,
    /// Free-form detail.
    pub message: Option<String>,
}

impl StageOutcome {
    /// Status 0.
    pub fn success() -> Self {
        Self::default()
    }

    /// A non-zero status with a message.
    pub fn failure(status_code: i32, message: impl Into<String>) -> Self {
        Self {
            status_code,
            message: Some(message.into()),
        }
    }

    /// Attaches a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Whether the status is zero.
    pub fn is_success(&self) -> bool {
        self.status_code == 0
    }
}

impl From<i32> for StageOutcome {
    fn from(status_code: i32) -> Self {
        Self {
            status_code,
            message: None,
        }
    }
}

/// What a stage failure does to the rest of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and move on to the next stage.
    #[default]
    Continue,
    /// Stop the run; later stages are not attempted.
    Abort,
}

impl FailurePolicy {
    /// Returns the string name of this policy.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continue => "continue",
            Self::Abort => "abort",
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continue" => Ok(Self::Continue),
            "abort" => Ok(Self::Abort),
            other => Err(AppError::configuration(format!(
                "failure policy must be one of ['continue', 'abort'], got '{other}'"
            ))),
        }
    }
}

/// A named routine the pipeline runs.
#[async_trait]
pub trait Stage: Send + Sync + std::fmt::Debug {
    /// Unique stage name.
    fn name(&self) -> &str;

    /// Declared parameters, resolved against the stage's own parameter map.
    fn params(&self) -> &ParamSchema;

    /// Runs the stage.
    async fn call(&self, args: &BoundArgs) -> AppResult<StageOutcome>;
}

type BoxedCall = Arc<
    dyn Fn(BoundArgs) -> Pin<Box<dyn Future<Output = AppResult<StageOutcome>> + Send>>
        + Send
        + Sync,
>;

/// A stage backed by a closure.
pub struct ClosureStage {
    name: String,
    schema: ParamSchema,
    call: BoxedCall,
}

impl std::fmt::Debug for ClosureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureStage")
            .field("name", &self.name)
            .field("schema", &self.schema)
            .finish()
    }
}

impl ClosureStage {
    /// Creates a stage from an async closure.
    pub fn new<F, Fut>(name: impl Into<String>, schema: ParamSchema, call: F) -> Self
    where
        F: Fn(BoundArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<StageOutcome>> + Send + 'static,
    {
        Self {
            name: name.into(),
            schema,
            call: Arc::new(move |args| Box::pin(call(args))),
        }
    }

    /// Creates a stage from a synchronous closure.
    pub fn from_fn<F>(name: impl Into<String>, schema: ParamSchema, call: F) -> Self
    where
        F: Fn(&BoundArgs) -> AppResult<StageOutcome> + Send + Sync + 'static,
    {
        let call = Arc::new(call);
        Self::new(name, schema, move |args| {
            let call = Arc::clone(&call);
            async move { call(&args) }
        })
    }
}

#[async_trait]
impl Stage for ClosureStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ParamSchema {
        &self.schema
    }

    async fn call(&self, args: &BoundArgs) -> AppResult<StageOutcome> {
        (self.call)(args.clone()).await
    }
}

/// A stage that runs an external command.
///
/// The exit code becomes the status code. Bound arguments are passed as
/// `STAGE_ARG_<NAME>` environment variables and as JSON on stdin.
#[derive(Debug, Clone)]
pub struct CommandStage {
    name: String,
    program: String,
    args: Vec<String>,
    schema: ParamSchema,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl CommandStage {
    /// Creates a stage running `program` with no arguments or parameters.
    pub fn new(name: impl Into<String>, program: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            schema: ParamSchema::new(),
            working_dir: None,
            timeout: None,
        }
    }

    /// Command-line arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Declared parameters.
    pub fn with_params(mut self, schema: ParamSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Working directory of the child.
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Kills the command when it runs longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Stage for CommandStage {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> &ParamSchema {
        &self.schema
    }

    async fn call(&self, args: &BoundArgs) -> AppResult<StageOutcome> {
        let mut spec = ProcessSpec::new(&self.program).with_bound_args("STAGE_ARG_", args)?;
        spec.args = self.args.clone();
        spec.env.insert("STAGE_NAME".to_string(), self.name.clone());
        spec.working_dir = self.working_dir.clone();
        spec.timeout = self.timeout;

        let output = process::run(&spec).await.map_err(|e| match e.kind {
            ErrorKind::Io => AppError {
                kind: ErrorKind::Stage,
                message: format!("Stage '{}': {}", self.name, e.message),
                ..e
            },
            _ => e,
        })?;
        let status_code = output.exit_code.unwrap_or(-1);

        let message = if status_code == 0 {
            output.stdout.trim().to_string()
        } else {
            output.stderr.chars().take(2000).collect::<String>().trim().to_string()
        };

        Ok(StageOutcome {
            status_code,
            message: (!message.is_empty()).then_some(message),
        })
    }
}
