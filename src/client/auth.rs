//! Role guard for mutating operations.
//!
//! K_i: The check runs before any request is built, so a denied call
//! performs no I/O.

use crate::client::FeedbackApi;
use crate::models::{FeedbackError, Result, UserRole};
use tracing::debug;

/// Roles allowed to mutate remote datasets.
pub const ELEVATED_ROLES: [UserRole; 2] = [UserRole::Owner, UserRole::Admin];

/// Fail with `PermissionDenied` unless the connected user has one of `roles`.
pub fn allowed_for_roles(
    api: &dyn FeedbackApi,
    roles: &[UserRole],
    operation: &'static str,
) -> Result<()> {
    let role = api.current_user().role;
    if roles.contains(&role) {
        return Ok(());
    }
    debug!(operation, %role, "Rejected by role guard");
    Err(FeedbackError::PermissionDenied { operation, role })
}

/// Shorthand for the owner/admin gate.
pub fn require_elevated(api: &dyn FeedbackApi, operation: &'static str) -> Result<()> {
    allowed_for_roles(api, &ELEVATED_ROLES, operation)
}
