//! Hook unit discovery and (re)loading.
//!
//! A [`HookLoader`] scans hook directories for units recognised by its
//! [`UnitLoader`] strategy, hashes them, and turns them into [`CodeUnit`]s.
//!
//! Two load paths exist:
//!
//! - [`HookLoader::load_all`] always loads every candidate and returns a
//!   fresh snapshot. The pipeline uses it on every refresh.
//! - [`HookLoader::load_one`] keeps a content-addressed cache: a unit is
//!   re-loaded only when its digest changes, and a unit that can no longer
//!   be found is pruned from the cache.
//!
//! Within a directory, entries are visited in file-name order; with
//! `recursive`, subdirectories are scanned after the current level.

pub mod closure;
#[cfg(feature = "dynamic")]
pub mod dynamic;
pub mod hashing;
pub mod script;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::LoaderError;
use crate::registry::{CodeUnit, UnitRegistry};
use crate::traits::HookUnit;

pub use closure::ClosureLoader;
#[cfg(feature = "dynamic")]
pub use dynamic::DynamicLoader;
pub use script::ScriptLoader;

/// Strategy that turns a discovered candidate into an executable unit.
pub trait UnitLoader: Send + Sync + std::fmt::Debug {
    /// Recognised source suffix, without the leading dot.
    fn extension(&self) -> &str;

    /// File stem of the package-marker file.
    fn package_marker(&self) -> &str {
        "__init__"
    }

    /// Loads the candidate. An error skips the unit; it never aborts a scan.
    fn load(&self, candidate: &Candidate) -> Result<Arc<dyn HookUnit>, LoaderError>;
}

/// Shape of a candidate on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    /// A single source file.
    File,
    /// A directory holding a package-marker file.
    Directory,
}

/// A loadable unit found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Unit name.
    pub name: String,
    /// The file, or the package directory.
    pub location: PathBuf,
    /// File the strategy should load: the file itself, or the package
    /// marker inside the directory.
    pub entry_point: PathBuf,
    /// File or directory unit.
    pub kind: CandidateKind,
    /// Digest computed at discovery time.
    pub content_hash: String,
}

/// Result of a targeted [`HookLoader::load_one`].
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// First load of this name.
    Loaded(CodeUnit),
    /// The digest changed and the unit was loaded again.
    Reloaded(CodeUnit),
    /// The digest is unchanged; the cached instance is returned.
    Cached(CodeUnit),
    /// No unit of that name exists any more.
    NotFound,
}

impl LoadOutcome {
    /// The unit, unless nothing was found.
    pub fn unit(&self) -> Option<&CodeUnit> {
        match self {
            Self::Loaded(unit) | Self::Reloaded(unit) | Self::Cached(unit) => Some(unit),
            Self::NotFound => None,
        }
    }

    /// Whether a unit was found.
    pub fn is_found(&self) -> bool {
        !matches!(self, Self::NotFound)
    }
}

/// Discovers and loads hook units through a [`UnitLoader`] strategy.
#[derive(Debug, Clone)]
pub struct HookLoader {
    strategy: Arc<dyn UnitLoader>,
    cache: UnitRegistry,
}

impl HookLoader {
    /// Creates a loader with an empty cache.
    pub fn new(strategy: Arc<dyn UnitLoader>) -> Self {
        Self {
            strategy,
            cache: UnitRegistry::new(),
        }
    }

    /// The load strategy.
    pub fn strategy(&self) -> &Arc<dyn UnitLoader> {
        &self.strategy
    }

    /// Lists loadable candidates under `directory`.
    ///
    /// Only an unreadable `directory` is an error. A file that cannot be
    /// hashed, or a subdirectory that cannot be listed, is logged and
    /// skipped.
    pub fn discover(&self, directory: &Path, recursive: bool) -> Result<Vec<Candidate>, LoaderError> {
        if !directory.is_dir() {
            return Err(LoaderError::NotADirectory {
                path: directory.to_path_buf(),
            });
        }

        let entries = hashing::sorted_entries(directory)?;
        let mut candidates = Vec::new();
        self.scan(entries, recursive, &mut candidates);
        Ok(candidates)
    }

    fn scan(&self, entries: Vec<PathBuf>, recursive: bool, candidates: &mut Vec<Candidate>) {
        let extension = self.strategy.extension();
        let mut subdirs = Vec::new();

        for entry in entries {
            if entry.is_dir() {
                subdirs.push(entry);
                continue;
            }
            if !entry.is_file() || !hashing::has_extension(&entry, extension) {
                continue;
            }
            let Some(name) = entry.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if name == self.strategy.package_marker() {
                continue;
            }
            let content_hash = match hashing::content_hash(&entry, extension) {
                Ok(hash) => hash,
                Err(e) => {
                    warn!(
                        unit = %name,
                        location = %entry.display(),
                        error = %e,
                        "Hook unit could not be read, skipping"
                    );
                    continue;
                }
            };
            candidates.push(Candidate {
                name: name.to_string(),
                content_hash,
                entry_point: entry.clone(),
                location: entry,
                kind: CandidateKind::File,
            });
        }

        if !recursive {
            return;
        }
        for subdir in subdirs {
            match hashing::sorted_entries(&subdir) {
                Ok(entries) => self.scan(entries, recursive, candidates),
                Err(e) => warn!(
                    directory = %subdir.display(),
                    error = %e,
                    "Hook subdirectory could not be listed, skipping"
                ),
            }
        }
    }

    /// Loads every candidate under `directory` into a fresh registry.
    ///
    /// Units that fail to load are logged and skipped. When two candidates
    /// share a name the first one found wins.
    pub fn load_all(&self, directory: &Path, recursive: bool) -> Result<UnitRegistry, LoaderError> {
        let mut registry = UnitRegistry::new();

        for candidate in self.discover(directory, recursive)? {
            if registry.contains(&candidate.name) {
                debug!(
                    unit = %candidate.name,
                    location = %candidate.location.display(),
                    "Shadowed by an earlier unit, skipping"
                );
                continue;
            }
            match self.instantiate(&candidate) {
                Ok(unit) => {
                    registry.insert(unit);
                }
                Err(e) => {
                    warn!(
                        unit = %candidate.name,
                        location = %candidate.location.display(),
                        error = %e,
                        "Hook unit failed to load, skipping"
                    );
                }
            }
        }

        Ok(registry)
    }

    /// Loads several directories in order and merges them first-wins.
    ///
    /// A directory that cannot be scanned contributes nothing.
    pub fn load_all_from<'a, I>(&self, directories: I) -> UnitRegistry
    where
        I: IntoIterator<Item = (&'a Path, bool)>,
    {
        let mut merged = UnitRegistry::new();
        for (directory, recursive) in directories {
            match self.load_all(directory, recursive) {
                Ok(registry) => merged.extend(registry),
                Err(e) => {
                    warn!(
                        directory = %directory.display(),
                        error = %e,
                        "Hook directory could not be scanned"
                    );
                }
            }
        }
        merged
    }

    /// Loads a single named unit, reusing the cached instance when its
    /// content digest is unchanged.
    ///
    /// When the unit no longer exists, any cached copy is pruned and
    /// [`LoadOutcome::NotFound`] is returned.
    pub fn load_one(
        &mut self,
        directory: &Path,
        name: &str,
        recursive: bool,
    ) -> Result<LoadOutcome, LoaderError> {
        let Some(candidate) = self.find(directory, name, recursive)? else {
            if self.cache.remove(name).is_some() {
                info!(unit = %name, "Hook unit disappeared, pruned from cache");
            }
            return Ok(LoadOutcome::NotFound);
        };

        let cached_hash = self.cache.get(name).map(|u| u.content_hash().to_string());

        match cached_hash {
            Some(hash) if hash == candidate.content_hash => {
                debug!(unit = %name, "Hook unit unchanged, using cached instance");
                match self.cache.get(name) {
                    Some(unit) => Ok(LoadOutcome::Cached(unit.clone())),
                    None => Ok(LoadOutcome::NotFound),
                }
            }
            Some(_) => {
                let unit = self.instantiate(&candidate)?;
                info!(
                    unit = %name,
                    hash = %candidate.content_hash,
                    "Hook unit changed, reloaded"
                );
                self.cache.upsert(unit.clone());
                Ok(LoadOutcome::Reloaded(unit))
            }
            None => {
                let unit = self.instantiate(&candidate)?;
                info!(
                    unit = %name,
                    location = %candidate.location.display(),
                    "Hook unit loaded"
                );
                self.cache.insert(unit.clone());
                Ok(LoadOutcome::Loaded(unit))
            }
        }
    }

    /// Removes a cached unit. No-op when absent.
    pub fn delete(&mut self, name: &str) {
        if self.cache.remove(name).is_some() {
            debug!(unit = %name, "Hook unit removed from cache");
        }
    }

    /// A unit previously loaded with [`HookLoader::load_one`].
    pub fn cached(&self, name: &str) -> Option<&CodeUnit> {
        self.cache.get(name)
    }

    /// Names of cached units, in load order.
    pub fn cached_names(&self) -> Vec<String> {
        self.cache.names()
    }

    /// Finds `name` directly under `directory`, then depth-first in
    /// subdirectories when `recursive`.
    fn find(
        &self,
        directory: &Path,
        name: &str,
        recursive: bool,
    ) -> Result<Option<Candidate>, LoaderError> {
        if !directory.is_dir() || name == self.strategy.package_marker() {
            return Ok(None);
        }

        let extension = self.strategy.extension();

        let file = directory.join(format!("{name}.{extension}"));
        if file.is_file() {
            return Ok(Some(Candidate {
                name: name.to_string(),
                content_hash: hashing::content_hash(&file, extension)?,
                entry_point: file.clone(),
                location: file,
                kind: CandidateKind::File,
            }));
        }

        let package = directory.join(name);
        let marker = package.join(format!("{}.{extension}", self.strategy.package_marker()));
        if marker.is_file() {
            return Ok(Some(Candidate {
                name: name.to_string(),
                content_hash: hashing::content_hash(&package, extension)?,
                entry_point: marker,
                location: package,
                kind: CandidateKind::Directory,
            }));
        }

        if !recursive {
            return Ok(None);
        }
        let entries = match hashing::sorted_entries(directory) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(
                    directory = %directory.display(),
                    error = %e,
                    "Hook directory could not be listed, skipping"
                );
                return Ok(None);
            }
        };
        for entry in entries {
            if entry.is_dir()
                && let Some(found) = self.find(&entry, name, recursive)?
            {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    fn instantiate(&self, candidate: &Candidate) -> Result<CodeUnit, LoaderError> {
        let entry = self.strategy.load(candidate)?;
        Ok(CodeUnit::new(
            candidate.name.clone(),
            candidate.location.clone(),
            candidate.content_hash.clone(),
            entry,
        ))
    }
}
