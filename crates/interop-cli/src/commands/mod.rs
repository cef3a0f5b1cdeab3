//! CLI command implementations.

pub mod handle;
pub mod probe;
