//! Shared test helpers for integration tests.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tempfile::TempDir;

use hookline_plugin::loader::{Candidate, ClosureLoader, HookLoader};
use hookline_plugin::params::{BoundArgs, ParamSchema};
use hookline_plugin::pipeline::Pipeline;
use hookline_plugin::stage::{ClosureStage, Stage, StageOutcome};
use hookline_plugin::traits::{ClosureUnit, HookUnit};

/// Ordered record of which hooks and stages ran.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Scratch directory tree for hook files.
pub struct HookTree {
    dir: TempDir,
}

impl HookTree {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of `relative` inside the tree.
    pub fn join(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    /// Writes a file, creating parent directories.
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(&path, contents).expect("write hook");
        path
    }

    pub fn remove(&self, relative: &str) {
        fs::remove_file(self.join(relative)).expect("remove hook");
    }
}

/// A `.hook` strategy whose units return the JSON written in their file.
///
/// Each run records `hook:<name>` in `log`. A file containing `params: a, b`
/// on its first line declares required parameters instead; such a unit
/// returns `true`.
pub fn outcome_loader(log: &CallLog) -> ClosureLoader {
    let log = log.clone();
    ClosureLoader::new("hook").with_default(move |candidate: &Candidate| {
        let source = fs::read_to_string(&candidate.entry_point).map_err(|e| e.to_string())?;
        let source = source.trim();

        let (schema, outcome) = match source.strip_prefix("params:") {
            Some(list) => {
                let schema = list
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .fold(ParamSchema::new(), |s, p| s.required(p));
                (schema, Value::Bool(true))
            }
            None => (
                ParamSchema::new(),
                serde_json::from_str(source).map_err(|e| e.to_string())?,
            ),
        };

        let name = candidate.name.clone();
        let log = log.clone();
        let unit = ClosureUnit::from_fn(schema, move |_: &BoundArgs| {
            log.push(format!("hook:{name}"));
            Ok(outcome.clone())
        });
        Ok(Arc::new(unit) as Arc<dyn HookUnit>)
    })
}

/// A pipeline over [`outcome_loader`].
pub fn pipeline(log: &CallLog) -> Pipeline {
    Pipeline::new(HookLoader::new(Arc::new(outcome_loader(log))))
}

/// A stage that records `stage:<name>` and returns `status`.
pub fn recording_stage(name: &str, schema: ParamSchema, status: i32, log: &CallLog) -> Arc<dyn Stage> {
    let log = log.clone();
    let label = format!("stage:{name}");
    Arc::new(ClosureStage::from_fn(name, schema, move |_| {
        log.push(label.clone());
        Ok(StageOutcome::from(status))
    }))
}
