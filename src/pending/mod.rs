//! Display-time helpers for the provisional (active) block.

mod fixer;

pub use fixer::*;
