//! Argilla client module.
//!
//! Provides:
//! - `FeedbackApi`: The remote operations the dataset layer depends on
//! - `ArgillaClient`: reqwest implementation of `FeedbackApi`
//! - Role guard for mutating operations

mod api;
mod argilla;
pub mod auth;

pub use api::*;
pub use argilla::*;
