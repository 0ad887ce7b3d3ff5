//! In-process load strategy.
//!
//! Discovery and hashing still happen on disk, but the unit itself comes
//! from a factory registered by name. Useful for embedding hookline in a
//! host that compiles its hooks in, and for exercising reload behavior.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::error::LoaderError;
use crate::loader::{Candidate, UnitLoader};
use crate::traits::HookUnit;

type Factory = Arc<dyn Fn(&Candidate) -> Result<Arc<dyn HookUnit>, String> + Send + Sync>;

/// Builds units from registered factories.
///
/// Clones share their load counters.
#[derive(Clone)]
pub struct ClosureLoader {
    extension: String,
    factories: HashMap<String, Factory>,
    fallback: Option<Factory>,
    loads: Arc<Mutex<HashMap<String, usize>>>,
}

impl std::fmt::Debug for ClosureLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("ClosureLoader")
            .field("extension", &self.extension)
            .field("factories", &names)
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl ClosureLoader {
    /// Creates a loader recognising files with `extension`.
    pub fn new(extension: impl Into<String>) -> Self {
        Self {
            extension: extension.into(),
            factories: HashMap::new(),
            fallback: None,
            loads: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Registers the factory for units named `name`.
    pub fn with_unit<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Candidate) -> Result<Arc<dyn HookUnit>, String> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Factory used for names without a dedicated one.
    pub fn with_default<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Candidate) -> Result<Arc<dyn HookUnit>, String> + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(factory));
        self
    }

    /// How many times `name` has been instantiated.
    pub fn load_count(&self, name: &str) -> usize {
        self.loads
            .lock()
            .map(|loads| loads.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

impl UnitLoader for ClosureLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn load(&self, candidate: &Candidate) -> Result<Arc<dyn HookUnit>, LoaderError> {
        let factory = self
            .factories
            .get(&candidate.name)
            .or(self.fallback.as_ref())
            .ok_or_else(|| {
                LoaderError::load(
                    &candidate.name,
                    &candidate.location,
                    "no factory registered for this unit",
                )
            })?;

        let unit = factory(candidate)
            .map_err(|reason| LoaderError::load(&candidate.name, &candidate.location, reason))?;

        if let Ok(mut loads) = self.loads.lock() {
            *loads.entry(candidate.name.clone()).or_insert(0) += 1;
        }
        Ok(unit)
    }
}
