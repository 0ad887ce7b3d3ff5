//! Script load strategy: each hook unit is a script run by an interpreter.
//!
//! A script may declare its parameters in a header comment:
//!
//! ```text
//! #!/bin/sh
//! # hook-params: t1, t2, mode="strict", limit=10
//! ```
//!
//! Defaults are parsed as JSON and fall back to plain text. Without a
//! header the unit takes no parameters.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hookline_core::AppResult;
use hookline_core::config::loader::LoaderConfig;
use serde_json::Value;

use crate::error::LoaderError;
use crate::loader::{Candidate, CandidateKind, UnitLoader};
use crate::params::{BoundArgs, ParamSchema};
use crate::process::{self, ProcessSpec};
use crate::traits::HookUnit;

const HEADER_TAG: &str = "hook-params:";

/// Lines scanned for the parameter header.
const HEADER_SCAN_LINES: usize = 10;

/// Loads script files as hook units.
#[derive(Debug, Clone)]
pub struct ScriptLoader {
    interpreter: String,
    extension: String,
    package_marker: String,
    timeout: Option<Duration>,
}

impl Default for ScriptLoader {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl ScriptLoader {
    /// Creates a loader for `interpreter`. The suffix defaults to the
    /// interpreter's file name.
    pub fn new(interpreter: impl Into<String>) -> Self {
        let interpreter = interpreter.into();
        let extension = Path::new(&interpreter)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sh")
            .to_string();
        Self {
            interpreter,
            extension,
            package_marker: "__init__".to_string(),
            timeout: None,
        }
    }

    /// Builds the loader from the `[loader]` config section.
    pub fn from_config(config: &LoaderConfig) -> Self {
        let mut loader = Self::new(&config.interpreter).with_package_marker(&config.package_marker);
        if let Some(ref extension) = config.extension {
            loader = loader.with_extension(extension);
        }
        if let Some(seconds) = config.timeout_seconds {
            loader = loader.with_timeout(Duration::from_secs(seconds));
        }
        loader
    }

    /// Overrides the recognised suffix.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Overrides the package-marker stem.
    pub fn with_package_marker(mut self, marker: impl Into<String>) -> Self {
        self.package_marker = marker.into();
        self
    }

    /// Kills scripts that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl UnitLoader for ScriptLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn package_marker(&self) -> &str {
        &self.package_marker
    }

    fn load(&self, candidate: &Candidate) -> Result<Arc<dyn HookUnit>, LoaderError> {
        let source = std::fs::read_to_string(&candidate.entry_point).map_err(|e| {
            LoaderError::load(&candidate.name, &candidate.location, format!("unreadable: {e}"))
        })?;

        let schema = parse_header(&source)
            .map_err(|reason| LoaderError::load(&candidate.name, &candidate.location, reason))?;

        let working_dir = match candidate.kind {
            CandidateKind::Directory => Some(candidate.location.clone()),
            CandidateKind::File => candidate.location.parent().map(Path::to_path_buf),
        };

        Ok(Arc::new(ScriptUnit {
            name: candidate.name.clone(),
            script: candidate.entry_point.clone(),
            working_dir,
            interpreter: self.interpreter.clone(),
            timeout: self.timeout,
            schema,
        }))
    }
}

/// A loaded script.
#[derive(Debug)]
pub struct ScriptUnit {
    name: String,
    script: PathBuf,
    working_dir: Option<PathBuf>,
    interpreter: String,
    timeout: Option<Duration>,
    schema: ParamSchema,
}

#[async_trait]
impl HookUnit for ScriptUnit {
    fn params(&self) -> &ParamSchema {
        &self.schema
    }

    async fn run(&self, args: &BoundArgs) -> AppResult<Value> {
        let mut spec = ProcessSpec::new(&self.interpreter).with_bound_args("HOOK_ARG_", args)?;
        spec.args.push(self.script.to_string_lossy().to_string());
        spec.env.insert("HOOK_NAME".to_string(), self.name.clone());
        spec.working_dir = self.working_dir.clone();
        spec.timeout = self.timeout;

        let output = process::run(&spec).await?;

        if !output.success() {
            tracing::debug!(
                hook = %self.name,
                exit_code = ?output.exit_code,
                stderr = %output.stderr.chars().take(500).collect::<String>(),
                "Hook script exited non-zero"
            );
            return Ok(Value::Bool(false));
        }

        Ok(parse_outcome(&output.stdout))
    }
}

/// Interprets a successful script's stdout.
fn parse_outcome(stdout: &str) -> Value {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Value::Bool(true);
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_string()))
}

/// Reads the `# hook-params:` header, if any.
fn parse_header(source: &str) -> Result<ParamSchema, String> {
    let Some(list) = source.lines().take(HEADER_SCAN_LINES).find_map(|line| {
        line.trim_start()
            .strip_prefix('#')
            .map(str::trim_start)
            .and_then(|rest| rest.strip_prefix(HEADER_TAG))
    }) else {
        return Ok(ParamSchema::new());
    };

    let mut schema = ParamSchema::new();
    for item in split_params(list) {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        schema = match item.split_once('=') {
            Some((name, default)) => schema.optional(name.trim(), parse_default(default.trim())),
            None => schema.required(item),
        };
    }

    schema.validate().map_err(|e| e.message)?;
    Ok(schema)
}

fn parse_default(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Splits on commas outside quotes and brackets.
fn split_params(list: &str) -> Vec<&str> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '[' | '{' => depth += 1,
            ']' | '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                items.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    items.push(&list[start..]);
    items
}
