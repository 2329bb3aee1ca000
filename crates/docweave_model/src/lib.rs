//! # Docweave Model
//!
//! Block model and JSON wire codec for Docweave.
//!
//! This crate provides:
//! - `Block` and its closed payload sum type (`BlockPayload`)
//! - `ConvertedDocument`, the flat output of a markdown conversion
//! - `Batch`, one ordered write unit
//! - JSON encoding/decoding in the remote store's flat block format
//!
//! This is a pure model crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod block;
mod error;
mod wire;

pub use batch::Batch;
pub use block::{
    Block, BlockId, BlockPayload, TableContent, TableProperty, TextContent, TextKind,
    READ_ONLY_TABLE_KEY,
};
pub use error::{ModelError, ModelResult};
pub use wire::{block_type, ConvertedDocument};
