//! CLI command implementations.

pub mod convert;
pub mod plan;
pub mod sync;
