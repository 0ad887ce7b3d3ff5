//! Unit registry: ordered, name-keyed collection of loaded hook units.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::traits::HookUnit;

/// A loaded hook unit and the identity it was loaded under.
#[derive(Debug, Clone)]
pub struct CodeUnit {
    name: String,
    location: PathBuf,
    content_hash: String,
    entry: Arc<dyn HookUnit>,
}

impl CodeUnit {
    /// Wraps a loaded entry point.
    pub fn new(
        name: impl Into<String>,
        location: impl Into<PathBuf>,
        content_hash: impl Into<String>,
        entry: Arc<dyn HookUnit>,
    ) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            content_hash: content_hash.into(),
            entry,
        }
    }

    /// Unit name (file stem or package directory name).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the unit was loaded from.
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Content digest the unit was loaded under.
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// The `run` entry point.
    pub fn entry(&self) -> &Arc<dyn HookUnit> {
        &self.entry
    }

    /// Whether both handles point at the same loaded instance.
    pub fn same_instance(&self, other: &CodeUnit) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }
}

/// Ordered registry of code units. At most one unit per name.
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    units: Vec<CodeUnit>,
}

impl UnitRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit unless one with the same name is already present.
    ///
    /// Returns `false` when the unit was discarded because an earlier unit
    /// owns the name.
    pub fn insert(&mut self, unit: CodeUnit) -> bool {
        if let Some(existing) = self.get(unit.name()) {
            debug!(
                unit = %unit.name(),
                kept = %existing.location().display(),
                discarded = %unit.location().display(),
                "Duplicate hook unit name, keeping the first one found"
            );
            return false;
        }
        self.units.push(unit);
        true
    }

    /// Replaces the unit with the same name in place, or appends it.
    pub fn upsert(&mut self, unit: CodeUnit) {
        match self.units.iter_mut().find(|u| u.name == unit.name) {
            Some(slot) => *slot = unit,
            None => self.units.push(unit),
        }
    }

    /// Merges `other` into this registry; first-wins on names.
    pub fn extend(&mut self, other: UnitRegistry) {
        for unit in other.units {
            self.insert(unit);
        }
    }

    /// Looks up a unit by name.
    pub fn get(&self, name: &str) -> Option<&CodeUnit> {
        self.units.iter().find(|u| u.name == name)
    }

    /// Removes a unit by name.
    pub fn remove(&mut self, name: &str) -> Option<CodeUnit> {
        let index = self.units.iter().position(|u| u.name == name)?;
        Some(self.units.remove(index))
    }

    /// Whether a unit with this name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Unit names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.units.iter().map(|u| u.name.clone()).collect()
    }

    /// Units in registry order.
    pub fn iter(&self) -> impl Iterator<Item = &CodeUnit> {
        self.units.iter()
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

impl IntoIterator for UnitRegistry {
    type Item = CodeUnit;
    type IntoIter = std::vec::IntoIter<CodeUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}
