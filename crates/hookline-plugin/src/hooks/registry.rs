//! Hook binding store: which directories feed which stage, at which position.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use hookline_core::error::AppError;
use tracing::{debug, info, warn};

use super::definitions::{HookDirectorySpec, HookPosition};
use crate::loader::HookLoader;
use crate::registry::{CodeUnit, UnitRegistry};

/// Bound directories and the hooks last loaded from them.
#[derive(Debug, Default)]
struct PositionBindings {
    specs: Vec<HookDirectorySpec>,
    hooks: UnitRegistry,
}

/// Bindings of one stage, per position.
#[derive(Debug, Default)]
struct StageBindings {
    positions: HashMap<HookPosition, PositionBindings>,
}

/// Per-stage, per-position hook directory bindings.
///
/// Stages must be registered before directories can be bound to them.
#[derive(Debug, Default)]
pub struct HookBindingStore {
    stages: HashMap<String, StageBindings>,
}

impl HookBindingStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `stage` known to the store. No-op if it already is.
    pub fn register_stage(&mut self, stage: &str) {
        self.stages.entry(stage.to_string()).or_default();
    }

    /// Drops every binding of `stage`.
    pub fn remove_stage(&mut self, stage: &str) {
        if self.stages.remove(stage).is_some() {
            debug!(stage = %stage, "Hook bindings dropped");
        }
    }

    /// Binds `directory` to `stage` at `position` (default `Before`).
    ///
    /// Binding a directory that is already bound at that position replaces
    /// the existing spec in place.
    pub fn bind(
        &mut self,
        stage: &str,
        directory: impl Into<PathBuf>,
        recursive: bool,
        position: Option<HookPosition>,
    ) -> Result<(), AppError> {
        let position = position.unwrap_or_default();
        let bindings = self
            .stages
            .get_mut(stage)
            .ok_or_else(|| AppError::configuration(format!("Unknown stage '{stage}'")))?;

        let spec = HookDirectorySpec::new(directory, recursive, position);
        let specs = &mut bindings.positions.entry(position).or_default().specs;

        match specs.iter_mut().find(|s| s.same_directory(&spec.directory)) {
            Some(existing) => {
                debug!(
                    stage = %stage,
                    position = %position,
                    directory = %spec.directory.display(),
                    recursive = recursive,
                    "Hook directory rebound"
                );
                *existing = spec;
            }
            None => {
                info!(
                    stage = %stage,
                    position = %position,
                    directory = %spec.directory.display(),
                    recursive = recursive,
                    "Hook directory bound"
                );
                specs.push(spec);
            }
        }

        Ok(())
    }

    /// Unbinds one directory, or every directory when `directory` is `None`.
    ///
    /// Unknown stages, positions, and directories are ignored.
    pub fn unbind(&mut self, stage: &str, directory: Option<&Path>, position: HookPosition) {
        let Some(bindings) = self.stages.get_mut(stage) else {
            return;
        };

        match directory {
            None => {
                if bindings.positions.remove(&position).is_some() {
                    info!(stage = %stage, position = %position, "All hook directories unbound");
                }
            }
            Some(directory) => {
                if let Some(slot) = bindings.positions.get_mut(&position) {
                    let before = slot.specs.len();
                    slot.specs.retain(|s| !s.same_directory(directory));
                    if slot.specs.len() != before {
                        info!(
                            stage = %stage,
                            position = %position,
                            directory = %directory.display(),
                            "Hook directory unbound"
                        );
                    }
                }
            }
        }
    }

    /// Reloads every bound directory into its stage/position hook list.
    ///
    /// Within one position, directories are merged in binding order with
    /// the first unit of a given name winning.
    pub fn refresh(&mut self, loader: &HookLoader) {
        for (stage, bindings) in &mut self.stages {
            for (position, slot) in &mut bindings.positions {
                let mut merged = UnitRegistry::new();
                for spec in &slot.specs {
                    match loader.load_all(&spec.directory, spec.recursive) {
                        Ok(units) => merged.extend(units),
                        Err(e) => warn!(
                            stage = %stage,
                            position = %position,
                            directory = %spec.directory.display(),
                            error = %e,
                            "Hook directory could not be loaded"
                        ),
                    }
                }
                debug!(
                    stage = %stage,
                    position = %position,
                    hooks = ?merged.names(),
                    "Hooks refreshed"
                );
                slot.hooks = merged;
            }
        }
    }

    /// Bound directory specs, in binding order.
    pub fn specs(&self, stage: &str, position: HookPosition) -> Vec<HookDirectorySpec> {
        self.slot(stage, position)
            .map(|slot| slot.specs.clone())
            .unwrap_or_default()
    }

    /// Hooks loaded by the last refresh, in chain order.
    pub fn hooks(&self, stage: &str, position: HookPosition) -> Vec<CodeUnit> {
        self.slot(stage, position)
            .map(|slot| slot.hooks.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Whether the last refresh produced any hook for `stage`.
    pub fn has_hooks(&self, stage: &str) -> bool {
        HookPosition::ALL
            .iter()
            .any(|p| self.slot(stage, *p).is_some_and(|slot| !slot.hooks.is_empty()))
    }

    /// Whether `stage` is known.
    pub fn contains_stage(&self, stage: &str) -> bool {
        self.stages.contains_key(stage)
    }

    fn slot(&self, stage: &str, position: HookPosition) -> Option<&PositionBindings> {
        self.stages.get(stage)?.positions.get(&position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_unknown_stage_is_configuration_error() {
        let mut store = HookBindingStore::new();
        let err = store.bind("ghost", "/hooks", false, None).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_bind_defaults_to_before_and_upserts() {
        let mut store = HookBindingStore::new();
        store.register_stage("s");
        store.bind("s", "/a", false, None).unwrap();
        store.bind("s", "/b", false, None).unwrap();
        store.bind("s", "/a", true, None).unwrap();

        let specs = store.specs("s", HookPosition::Before);
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].directory, PathBuf::from("/a"));
        assert!(specs[0].recursive);
        assert!(store.specs("s", HookPosition::After).is_empty());
    }

    #[test]
    fn test_same_directory_at_both_positions_is_two_bindings() {
        let mut store = HookBindingStore::new();
        store.register_stage("s");
        store.bind("s", "/a", false, Some(HookPosition::Before)).unwrap();
        store.bind("s", "/a", false, Some(HookPosition::After)).unwrap();

        assert_eq!(store.specs("s", HookPosition::Before).len(), 1);
        assert_eq!(store.specs("s", HookPosition::After).len(), 1);
    }

    #[test]
    fn test_unbind_single_and_all() {
        let mut store = HookBindingStore::new();
        store.register_stage("s");
        store.bind("s", "/a", false, None).unwrap();
        store.bind("s", "/b", false, None).unwrap();

        store.unbind("s", Some(Path::new("/a")), HookPosition::Before);
        assert_eq!(store.specs("s", HookPosition::Before).len(), 1);

        store.unbind("s", None, HookPosition::Before);
        assert!(store.specs("s", HookPosition::Before).is_empty());

        store.unbind("ghost", None, HookPosition::After);
        store.unbind("s", Some(Path::new("/zzz")), HookPosition::After);
    }

    #[test]
    fn test_remove_stage_drops_bindings() {
        let mut store = HookBindingStore::new();
        store.register_stage("s");
        store.bind("s", "/a", false, None).unwrap();
        store.remove_stage("s");

        assert!(!store.contains_stage("s"));
        assert!(store.specs("s", HookPosition::Before).is_empty());
        assert!(store.bind("s", "/a", false, None).is_err());
    }
}
