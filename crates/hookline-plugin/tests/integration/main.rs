//! Integration tests for hookline-plugin.

mod helpers;
mod loader_test;
mod pipeline_test;
mod script_test;
