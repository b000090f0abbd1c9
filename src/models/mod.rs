//! Core data models for argilla-remote.
//!
//! Epistemic mapping:
//! - K_i (Knowledge): Concrete schema and record types with compile-time guarantees
//! - B_i (Beliefs): Wrapped in Result/Option
//! - I^R (Resolvable): Config parameters (batch sizes, server)
//! - I^B (Bounded): Error variants carrying the remote cause

mod config;
mod error;
mod filters;
mod one_or_many;
mod record;
mod schema;
mod user;

pub use config::*;
pub use error::*;
pub use filters::*;
pub use one_or_many::*;
pub use record::*;
pub use schema::*;
pub use user::*;
