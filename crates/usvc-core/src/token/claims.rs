use serde::{Deserialize, Serialize};

use crate::{access::ADMIN_ROLE, RoleSet, UserId};

/// Decoded payload of a session token.
///
/// Field names are the wire claim names: `{user_id, email, roles, exp, iat}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject identifier.
    pub user_id: UserId,

    /// Subject email at issue time.
    pub email: String,

    /// Role names granted at issue time.  Changes to the subject's roles take
    /// effect only in tokens issued afterwards.
    pub roles: RoleSet,

    /// Expires-at, Unix seconds.  The token is rejected at or after this instant.
    pub exp: u64,

    /// Issued-at, Unix seconds.
    pub iat: u64,
}

impl Claims {
    pub fn is_admin(&self) -> bool {
        self.roles.contains(ADMIN_ROLE)
    }
}
