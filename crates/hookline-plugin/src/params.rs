//! Parameter binding: resolve a routine's declared parameters against a
//! name → value map.
//!
//! Every stage and hook unit carries a [`ParamSchema`], an ordered list of
//! parameter names with optional defaults. Binding is purely name-keyed:
//!
//! - Required parameters (no default) must be present in the supplied map,
//!   otherwise [`BindError::MissingParameter`] names the routine and the
//!   first missing parameter.
//! - Defaulted parameters start from their default and are overridden when
//!   the supplied map has a value under that name.
//! - A routine declaring nothing is invoked with empty arguments.
//!
//! Values are never type-checked.

use std::collections::HashMap;

use hookline_core::error::AppError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::BindError;

/// Name → value map. Used both as a stage's own parameter map and as the
/// execution context shared by all hooks in a cycle.
pub type ParamMap = HashMap<String, Value>;

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Default value; `None` makes the parameter required.
    #[serde(default)]
    pub default: Option<Value>,
}

impl ParamSpec {
    /// Whether the caller must supply this parameter.
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Ordered declared-parameter list of a stage or hook unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSchema {
    params: Vec<ParamSpec>,
}

impl ParamSchema {
    /// An empty schema: the routine takes no arguments.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a required parameter.
    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    /// Appends a parameter with a default value.
    pub fn optional(mut self, name: impl Into<String>, default: Value) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    /// Builds a schema from an ordered name list and a defaults table, then
    /// validates it.
    pub fn from_parts(declared: &[String], defaults: &ParamMap) -> Result<Self, AppError> {
        let params = declared
            .iter()
            .map(|name| ParamSpec {
                name: name.clone(),
                default: defaults.get(name).cloned(),
            })
            .collect();
        let schema = Self { params };
        schema.validate()?;
        Ok(schema)
    }

    /// Rejects duplicate or empty names and required parameters declared
    /// after a defaulted one.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut seen_default = false;
        for (i, spec) in self.params.iter().enumerate() {
            if spec.name.trim().is_empty() {
                return Err(AppError::configuration(format!(
                    "parameter #{} has an empty name",
                    i + 1
                )));
            }
            if self.params[..i].iter().any(|p| p.name == spec.name) {
                return Err(AppError::configuration(format!(
                    "parameter '{}' is declared more than once",
                    spec.name
                )));
            }
            if spec.is_required() && seen_default {
                return Err(AppError::configuration(format!(
                    "required parameter '{}' follows a defaulted parameter",
                    spec.name
                )));
            }
            seen_default |= !spec.is_required();
        }
        Ok(())
    }

    /// Declared parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter()
    }

    /// Number of declared parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the routine takes no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Human-readable signature, e.g. `t1, t2, t3="hello"`.
    pub fn signature(&self) -> String {
        self.params
            .iter()
            .map(|p| match &p.default {
                Some(default) => format!("{}={}", p.name, default),
                None => p.name.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Arguments resolved for one invocation, in declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoundArgs {
    values: Vec<(String, Value)>,
    required: usize,
}

impl BoundArgs {
    /// Values of the required parameters, in order.
    pub fn positional(&self) -> impl Iterator<Item = &Value> {
        self.values[..self.required].iter().map(|(_, v)| v)
    }

    /// Name/value pairs of the defaulted parameters.
    pub fn named(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values[self.required..]
            .iter()
            .map(|(k, v)| (k.as_str(), v))
    }

    /// All name/value pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Looks up a bound value by parameter name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Number of bound arguments.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the routine is invoked without arguments.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Arguments as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

/// Resolves `schema` for `routine` against `supplied`.
pub fn bind(routine: &str, schema: &ParamSchema, supplied: &ParamMap) -> Result<BoundArgs, BindError> {
    if schema.is_empty() {
        return Ok(BoundArgs::default());
    }

    let mut required = Vec::new();
    let mut defaulted = Vec::new();

    for spec in schema.iter() {
        match &spec.default {
            None => {
                let value = supplied
                    .get(&spec.name)
                    .ok_or_else(|| BindError::MissingParameter {
                        routine: routine.to_string(),
                        signature: schema.signature(),
                        parameter: spec.name.clone(),
                    })?;
                required.push((spec.name.clone(), value.clone()));
            }
            Some(default) => {
                let value = supplied.get(&spec.name).unwrap_or(default);
                defaulted.push((spec.name.clone(), value.clone()));
            }
        }
    }

    let required_count = required.len();
    required.extend(defaulted);

    Ok(BoundArgs {
        values: required,
        required: required_count,
    })
}
