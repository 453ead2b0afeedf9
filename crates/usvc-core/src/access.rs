//! Role-based access policy for the user directory.
//!
//! The authorization gate only establishes *who* the caller is.  Whether the
//! caller may perform a given operation is decided here, per operation:
//!
//! - Operations on a specific subject's own record are allowed for that
//!   subject or for any admin; every other caller is forbidden.
//! - Admin-only operations (listing all users, role creation, role
//!   assignment, deletion) require the admin role regardless of identity.

use thiserror::Error;

use crate::{token::Claims, UserId};

/// The role name that grants directory-wide privileges.
pub const ADMIN_ROLE: &str = "admin";

/// The caller has a valid identity but lacks the privilege for the operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AccessDenied {
    #[error("admin role required")]
    AdminRequired,
    #[error("caller may only act on its own record")]
    NotOwner,
}

/// Allows the call only if `claims` carries the admin role.
pub fn require_admin(claims: &Claims) -> Result<(), AccessDenied> {
    if claims.is_admin() {
        Ok(())
    } else {
        Err(AccessDenied::AdminRequired)
    }
}

/// Allows the call if the caller is `target` or holds the admin role.
pub fn require_self_or_admin(claims: &Claims, target: UserId) -> Result<(), AccessDenied> {
    if claims.user_id == target || claims.is_admin() {
        Ok(())
    } else {
        Err(AccessDenied::NotOwner)
    }
}
