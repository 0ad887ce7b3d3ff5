//! Hook positions, directory bindings, and outcome interpretation.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use hookline_core::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where a hook runs relative to its stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookPosition {
    /// Runs before the stage; a falsy outcome vetoes the stage.
    #[default]
    Before,
    /// Runs after a successful stage.
    After,
}

impl HookPosition {
    /// Both positions, in chain order.
    pub const ALL: [HookPosition; 2] = [HookPosition::Before, HookPosition::After];

    /// Returns the string name of this position.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }

    /// Resolves an optional position, defaulting to `Before`.
    pub fn resolve(position: Option<&str>) -> Result<Self, AppError> {
        position.map_or(Ok(Self::Before), |p| p.parse())
    }
}

impl std::fmt::Display for HookPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HookPosition {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            other => Err(AppError::configuration(format!(
                "position must be one of ['before', 'after'], got '{other}'"
            ))),
        }
    }
}

/// A hook directory attached to a stage at a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDirectorySpec {
    /// Directory scanned for hook units.
    pub directory: PathBuf,
    /// Whether subdirectories are scanned too.
    pub recursive: bool,
    /// Position relative to the stage.
    pub position: HookPosition,
}

impl HookDirectorySpec {
    /// Creates a spec.
    pub fn new(directory: impl Into<PathBuf>, recursive: bool, position: HookPosition) -> Self {
        Self {
            directory: directory.into(),
            recursive,
            position,
        }
    }

    /// Two specs are the same binding when they name the same directory.
    pub fn same_directory(&self, directory: &Path) -> bool {
        self.directory == directory
    }
}

/// Truthiness of a hook outcome.
///
/// `null`, `false`, `0`, `""`, `[]`, and `{}` are falsy; everything else is
/// truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
