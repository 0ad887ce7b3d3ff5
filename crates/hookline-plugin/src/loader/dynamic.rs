//! Shared-library load strategy using `libloading`.
//!
//! A library must export:
//!
//! ```ignore
//! #[unsafe(no_mangle)]
//! pub extern "C" fn hookline_create_unit() -> *mut Box<dyn HookUnit> {
//!     Box::into_raw(Box::new(Box::new(MyHook::default())))
//! }
//! ```
//!
//! The dynamic linker caches libraries by path, so each content hash is
//! opened from its own copy under the cache directory. A changed file
//! therefore yields a fresh mapping instead of the stale one.
//!
//! Only load trusted libraries: their code runs in-process.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use hookline_core::AppResult;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::LoaderError;
use crate::loader::{Candidate, UnitLoader};
use crate::params::{BoundArgs, ParamSchema};
use crate::traits::HookUnit;

/// Symbol every hook library exports.
pub const CREATE_SYMBOL: &[u8] = b"hookline_create_unit";

/// Signature of [`CREATE_SYMBOL`].
pub type CreateUnitFn = unsafe extern "C" fn() -> *mut Box<dyn HookUnit>;

/// Loads hook units from shared libraries.
#[derive(Debug, Clone)]
pub struct DynamicLoader {
    extension: String,
    cache_dir: PathBuf,
}

impl Default for DynamicLoader {
    fn default() -> Self {
        Self::new(std::env::temp_dir().join("hookline-units"))
    }
}

impl DynamicLoader {
    /// Creates a loader that stages library copies under `cache_dir`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            extension: std::env::consts::DLL_EXTENSION.to_string(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Overrides the recognised suffix.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Copies the library to a path derived from its content hash.
    fn stage_copy(&self, candidate: &Candidate) -> Result<PathBuf, LoaderError> {
        std::fs::create_dir_all(&self.cache_dir).map_err(|e| LoaderError::io(&self.cache_dir, e))?;

        let staged = self.cache_dir.join(staged_name(
            &candidate.name,
            &candidate.content_hash,
            &self.extension,
        ));

        if !staged.exists() {
            std::fs::copy(&candidate.entry_point, &staged)
                .map_err(|e| LoaderError::io(&candidate.entry_point, e))?;
            self.prune_stale(&candidate.name, &staged);
        }
        Ok(staged)
    }

    /// Removes copies of `name` staged at other content hashes.
    fn prune_stale(&self, name: &str, current: &Path) {
        let Ok(entries) = std::fs::read_dir(&self.cache_dir) else {
            return;
        };
        for path in entries.filter_map(|entry| entry.ok().map(|e| e.path())) {
            if path == current || !is_staged_copy_of(&path, name, &self.extension) {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => debug!(unit = %name, stale = %path.display(), "Stale library copy removed"),
                Err(e) => warn!(
                    unit = %name,
                    stale = %path.display(),
                    error = %e,
                    "Stale library copy could not be removed"
                ),
            }
        }
    }
}

impl UnitLoader for DynamicLoader {
    fn extension(&self) -> &str {
        &self.extension
    }

    fn load(&self, candidate: &Candidate) -> Result<Arc<dyn HookUnit>, LoaderError> {
        let staged = self.stage_copy(candidate)?;
        let fail = |reason: String| LoaderError::load(&candidate.name, &candidate.location, reason);

        // SAFETY: hook libraries are trusted code and must export
        // `CREATE_SYMBOL` with the `CreateUnitFn` signature.
        let library = unsafe { libloading::Library::new(&staged) }
            .map_err(|e| fail(format!("cannot open library: {e}")))?;

        let unit = unsafe {
            let create: libloading::Symbol<CreateUnitFn> = library
                .get(CREATE_SYMBOL)
                .map_err(|e| fail(format!("missing 'hookline_create_unit' symbol: {e}")))?;
            let raw = create();
            if raw.is_null() {
                return Err(fail("'hookline_create_unit' returned null".to_string()));
            }
            *Box::from_raw(raw)
        };

        info!(
            unit = %candidate.name,
            staged = %staged.display(),
            "Dynamic hook library loaded"
        );

        Ok(Arc::new(LibraryUnit {
            unit,
            _library: library,
        }))
    }
}

/// A unit together with the library its code lives in.
///
/// Field order matters: the unit must drop before its library is unloaded.
#[derive(Debug)]
struct LibraryUnit {
    unit: Box<dyn HookUnit>,
    _library: libloading::Library,
}

#[async_trait]
impl HookUnit for LibraryUnit {
    fn params(&self) -> &ParamSchema {
        self.unit.params()
    }

    async fn run(&self, args: &BoundArgs) -> AppResult<Value> {
        self.unit.run(args).await
    }
}

/// File name of the staged copy for a unit at a given content hash.
pub fn staged_name(name: &str, content_hash: &str, extension: &str) -> String {
    let short_hash = &content_hash[..content_hash.len().min(16)];
    format!("{name}-{short_hash}.{extension}")
}

/// Whether `path` is a copy [`staged_name`] produced for `name`.
fn is_staged_copy_of(path: &Path, name: &str, extension: &str) -> bool {
    path.file_name()
        .and_then(|f| f.to_str())
        .and_then(|f| f.strip_prefix(name))
        .and_then(|f| f.strip_prefix('-'))
        .and_then(|f| f.strip_suffix(extension))
        .and_then(|f| f.strip_suffix('.'))
        .is_some_and(|hash| !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit()))
}
