//! Hook system: directory bindings, chain dispatch, and positions.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{HookDirectorySpec, HookPosition, is_truthy};
pub use dispatcher::{DispatchResult, HookDispatcher, HookInvocation};
pub use registry::HookBindingStore;
