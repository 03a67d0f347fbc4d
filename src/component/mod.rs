//! Component directives embedded in the stream as `[{c:"Name",p:{...}}]`.
//!
//! Directives may arrive one byte at a time, so extraction never fails: whatever part of the
//! props object has arrived is recovered through progressively looser repair tiers
//! (see [`repair_props`]).

mod directive;
mod registry;
mod repair;

use serde::Serialize;
use serde_json::{Map, Value};

pub use directive::{
    ComponentData, DirectiveSpan, Extraction, component_marker, extract_component_data,
    extract_component_data_with_report, extract_components, find_directives,
};
pub(crate) use directive::directive_end;
pub use registry::{ComponentDefinition, ComponentRegistry, Components, Validation, ValidationError};
pub use repair::{
    CleanupError, CleanupStep, JsonCleanupReport, RepairTier, RepairedProps, balance_braces,
    repair_props, safe_prefix,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// Name known, no props yet.
    Empty,
    /// Some props recovered from an unfinished or damaged directive.
    Partial,
    /// Closed directive whose props parsed as written or with balanced braces.
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentInstance {
    /// `Name@offset`, stable across extraction passes of the same stream.
    pub id: String,
    pub name: String,
    pub props: Map<String, Value>,
    pub classification: Classification,
    /// False when a registry was consulted and does not know `name`.
    pub resolved: bool,
}
