//! Error types for loading hook units and binding call arguments.
//!
//! Both map into `hookline_core::error::AppError` so the pipeline surface
//! only ever returns one error type.

use std::path::PathBuf;

use hookline_core::error::AppError;
use thiserror::Error;

/// Errors raised while discovering or loading hook units.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The hook directory does not exist or is not a directory.
    #[error("Hook directory not found or not a directory: {path}")]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },

    /// A candidate was found but the load strategy rejected it.
    #[error("Failed to load hook unit '{name}' from {path}: {reason}")]
    Load {
        /// Unit name.
        name: String,
        /// Location of the unit on disk.
        path: PathBuf,
        /// Why the strategy rejected it.
        reason: String,
    },

    /// Hashing or listing the directory failed.
    #[error("I/O error while scanning {path}: {source}")]
    Io {
        /// Path being read when the error occurred.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
}

impl LoaderError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn load(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Load {
            name: name.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<LoaderError> for AppError {
    fn from(err: LoaderError) -> Self {
        match &err {
            LoaderError::NotADirectory { .. } => AppError::not_found(err.to_string()),
            _ => AppError::plugin(err.to_string()),
        }
    }
}

/// Errors raised while resolving a routine's declared parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// A required parameter has no supplied value.
    #[error("{routine}({signature}) parameter '{parameter}' not provided")]
    MissingParameter {
        /// Stage or hook name.
        routine: String,
        /// Declared parameter list, for the message.
        signature: String,
        /// The parameter that could not be resolved.
        parameter: String,
    },
}

impl From<BindError> for AppError {
    fn from(err: BindError) -> Self {
        AppError::validation(err.to_string())
    }
}
