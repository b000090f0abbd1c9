//! argilla-remote - Client for feedback datasets hosted on an Argilla server.
//!
//! ## Architecture
//!
//! - **Client**: `FeedbackApi` is the remote surface; `ArgillaClient` speaks
//!   it over HTTP, and the role guard gates every mutation
//! - **Remote dataset**: identity and schema of a server-side dataset, with
//!   copy-on-configure filtering and sorting
//! - **Records view**: the filtered, sorted, paginated records behind a dataset
//! - **Local dataset**: the in-memory copy a remote dataset is pulled into
//!
//! ## Epistemic Design
//!
//! - K_i (Knowledge): Compile-time enforced invariants (types, enums)
//! - B_i (Beliefs): Runtime fallible operations (Result, Option)
//! - I^R (Resolvable): User-configurable parameters (batch sizes, server)
//! - I^B (Bounded): Network/API uncertainties (retry, backoff)

pub mod client;
pub mod dataset;
pub mod models;

// Re-exports for convenience
pub use client::{ArgillaClient, FeedbackApi};
pub use dataset::{FeedbackDataset, RemoteFeedbackDataset, RemoteFeedbackRecords};
pub use models::{
    Config, FeedbackError, MetadataFilter, ResponseStatusFilter, Result, SortBy, SortOrder,
};
