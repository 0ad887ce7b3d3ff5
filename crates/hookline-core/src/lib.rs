//! # hookline-core
//!
//! Core crate for hookline. Contains the configuration schemas consumed by
//! the daemon and the unified error system shared by every crate.
//!
//! This crate has **no** internal dependencies on other hookline crates.

pub mod config;
pub mod error;
pub mod result;

pub use error::AppError;
pub use result::AppResult;
