//! Child-process execution shared by script hooks and command stages.
//!
//! Arguments reach the child twice: as `<PREFIX><NAME>` environment
//! variables (strings verbatim, everything else as JSON) and as one JSON
//! object on stdin.

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use hookline_core::error::{AppError, ErrorKind};
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::params::BoundArgs;

/// What to run.
#[derive(Debug, Clone)]
pub(crate) struct ProcessSpec {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub stdin: Option<Vec<u8>>,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
}

impl ProcessSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin: None,
            working_dir: None,
            timeout: None,
        }
    }

    /// Exposes bound arguments as `<prefix><NAME>` variables and as JSON on
    /// stdin.
    pub fn with_bound_args(mut self, prefix: &str, args: &BoundArgs) -> Result<Self, AppError> {
        for (name, value) in args.iter() {
            self.env.insert(env_key(prefix, name), env_value(value));
        }
        self.stdin = Some(serde_json::to_vec(&args.to_json())?);
        Ok(self)
    }
}

/// What came back.
#[derive(Debug, Clone)]
pub(crate) struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns the process and waits for it, killing it if the timeout elapses.
pub(crate) async fn run(spec: &ProcessSpec) -> Result<ProcessOutput, AppError> {
    let start = Instant::now();

    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args)
        .envs(&spec.env)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(ref dir) = spec.working_dir {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|e| {
        AppError::with_source(
            ErrorKind::Io,
            format!("Failed to spawn '{}': {e}", spec.program),
            e,
        )
    })?;

    let stdin_bytes = spec.stdin.clone();
    let stdin_pipe = child.stdin.take();
    let completion = async move {
        if let (Some(mut pipe), Some(bytes)) = (stdin_pipe, stdin_bytes) {
            // The child may exit without reading its input.
            let _ = pipe.write_all(&bytes).await;
            drop(pipe);
        }
        child.wait_with_output().await
    };

    let output = match spec.timeout {
        Some(limit) => tokio::time::timeout(limit, completion)
            .await
            .map_err(|_| {
                AppError::timeout(format!(
                    "'{}' did not finish within {}s",
                    spec.program,
                    limit.as_secs_f64()
                ))
            })?,
        None => completion.await,
    }
    .map_err(|e| {
        AppError::with_source(
            ErrorKind::Io,
            format!("Failed to wait for '{}': {e}", spec.program),
            e,
        )
    })?;

    let result = ProcessOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration_ms: start.elapsed().as_millis() as u64,
    };

    tracing::debug!(
        program = %spec.program,
        exit_code = ?result.exit_code,
        duration_ms = result.duration_ms,
        "Process finished"
    );

    Ok(result)
}

fn env_key(prefix: &str, name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect();
    format!("{prefix}{name}")
}

fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
