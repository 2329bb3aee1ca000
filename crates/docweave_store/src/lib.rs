//! # Docweave Store
//!
//! In-memory reference document store for Docweave.
//!
//! This crate provides:
//! - `MemoryDocumentStore`, a `DocumentStore` that enforces the remote
//!   store's write limits
//! - `MarkdownConverter`, a pulldown-cmark based markdown to block converter
//! - Fault injection (visibility lag, scripted failures) for tests
//!
//! # Write rules
//!
//! A descendant write is accepted only if:
//! - It carries at most `max_descendants` blocks
//! - `children_id` is non-empty and every entry is among the descendants
//! - Every descendant's parent is the container, another descendant, or an
//!   already stored block
//! - No table carries read-only `merge_info`
//! - No block ID is repeated within the write
//!
//! Incoming IDs are temporary. One already taken in the document is stored
//! under a fresh ID, and later writes may still reference it by the
//! temporary ID.
//!
//! Violations answer with status 400 and nothing is applied.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod converter;
mod document;
mod error;
mod store;

pub use config::StoreConfig;
pub use converter::MarkdownConverter;
pub use document::Document;
pub use error::{ConvertError, WriteRejection, CODE_INVALID_PARAM};
pub use store::MemoryDocumentStore;
