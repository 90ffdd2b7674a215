//! Per-route authorization

use tracing::warn;
use userhub_db::UserProjection;

use crate::error::AuthError;

/// Access rule attached to a route
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Any verified caller
    Authenticated,
    /// Admins, or the user the route is about
    OwnerOrAdmin,
}

/// Decide whether a verified `user` may proceed under `policy`
///
/// `route_owner_id` is the user the route addresses, if any.
pub fn authorize(
    policy: AccessPolicy,
    user: &UserProjection,
    route_owner_id: Option<&str>,
) -> Result<(), AuthError> {
    match policy {
        AccessPolicy::Authenticated => Ok(()),
        AccessPolicy::OwnerOrAdmin => {
            if user.is_admin() || route_owner_id == Some(user.id.as_str()) {
                Ok(())
            } else {
                warn!(
                    user_id = %user.id,
                    route_owner = route_owner_id.unwrap_or("-"),
                    "Access denied"
                );
                Err(AuthError::AccessDenied)
            }
        }
    }
}
