//! Typed description and dispatch for every scanner/fixer/validator
//! operation (spec §4.1).

mod registry;
mod spec;

pub use registry::{RegistryError, ToolOutcome, ToolRegistry};
pub use spec::{ArtifactKind, Invoke, Risk, Schema, SchemaField, ToolCategory, ToolSpec};
