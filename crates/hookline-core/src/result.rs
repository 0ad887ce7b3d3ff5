//! Result alias used by stages, hook units, and the pipeline.

use crate::error::AppError;

/// `Result` specialised to [`AppError`].
///
/// Stage and hook implementations return this so that embedders only deal
/// with a single error type at the pipeline boundary.
pub type AppResult<T> = Result<T, AppError>;
