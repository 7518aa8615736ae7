//! Shared types for the flowbridge workspace.
//!
//! Keeps the key aliases and process-variable helpers used by both the
//! engine bridge and the API crate. Zero internal dependencies.

pub mod types;
pub mod variables;
