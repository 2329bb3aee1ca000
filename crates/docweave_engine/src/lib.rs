//! # Docweave Engine
//!
//! Batched, retry-tolerant block synchronization for Docweave.
//!
//! This crate provides:
//! - Partitioning of converted block collections into bounded batches
//! - Batch validation (parent normalization, metadata stripping, parent repair)
//! - Remote batch writes with fixed-interval retry on transient failures
//! - Graceful degradation to a single plain-text block
//! - The `DocumentStore` abstraction and an HTTP implementation
//!
//! ## Architecture
//!
//! A run moves through explicit phases:
//! 1. Truncate the markdown to the character ceiling
//! 2. Convert it through the store
//! 3. Partition and validate every batch before writing anything
//! 4. Write batches in order, each with its own retry budget
//! 5. On conversion or write failure, write the content as plain text
//!
//! ## Key Invariants
//!
//! - Block order is never changed; batches are contiguous slices
//! - Every batch carries at least one top-level block
//! - Structural defects abort before the first write
//! - A failed batch stops the run; later batches are never sent
//! - Fallback content is deterministic for a given input

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod executor;
mod fallback;
mod http;
mod partition;
mod sleep;
mod transport;
mod validate;

pub use config::{
    ParentRepairPolicy, RetryConfig, SyncOptions, DEFAULT_TRUNCATION_NOTICE, SERVER_MAX_BATCH,
};
pub use engine::{
    plan, CancelToken, FailureKind, SyncFailure, SyncPlan, Synchronizer, WriteResult, WriteStats,
};
pub use error::{
    StoreError, StoreErrorKind, StructuralError, SyncError, SyncResult, CODE_RATE_LIMITED,
    STATUS_NOT_YET_VISIBLE, STATUS_RATE_LIMITED,
};
pub use executor::{BatchWriter, RetryState, WriteFailure, WriteFailureKind, WriteReport};
pub use fallback::{
    fallback_block, truncate_content, DegradeReason, FallbackController, SyncPhase, Truncated,
    FALLBACK_BLOCK_ID,
};
pub use http::{
    HttpClient, HttpDocumentStore, HttpResponse, StaticToken, TenantTokenCache, TokenProvider,
};
pub use partition::partition;
pub use sleep::{RecordingSleeper, Sleeper, TokioSleeper};
pub use transport::{DocumentStore, RecordedWrite, ScriptedStore};
pub use validate::{validate_collection, BatchValidator, ValidationReport};
