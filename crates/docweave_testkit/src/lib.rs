//! # Docweave Testkit
//!
//! Test utilities for Docweave.
//!
//! This crate provides:
//! - Block collection fixtures (flat, nested, tables with read-only metadata)
//! - Property-based generators for block forests using proptest
//! - Temporary file helpers for CLI tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use docweave_testkit::prelude::*;
//!
//! #[test]
//! fn partitions_a_large_document() {
//!     let doc = flat_document(1200);
//!     // ... partition and assert
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
