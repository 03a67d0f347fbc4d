//! Incremental Markdown block splitting for streamed text.
//!
//! Feed the full text received so far to [`Splitter::process_new_content`]; the returned
//! [`BlockRegistry`] holds immutable [`StableBlock`]s plus one provisional active block whose
//! display text has dangling markup closed (see [`fix_incomplete_markdown`]).

pub mod ast;
pub mod component;
pub mod options;
pub mod pending;
pub mod splitter;
pub mod syntax;
pub mod tags;
pub mod types;

#[cfg(feature = "pulldown")]
pub mod adapters;

pub use ast::{BlockParser, Node, NodeKind, PlainTextParser};
pub use component::{
    Classification, ComponentDefinition, ComponentInstance, ComponentRegistry, Components,
};
pub use options::*;
pub use pending::*;
pub use splitter::*;
pub use tags::{OpenTag, TagKind, TagState, update_tag_state};
pub use types::*;
