//! # usvc-core
//!
//! Shared library for the user service containing the domain records, the
//! role-based access policy, the session token authority, and the discovery
//! wire protocol.
//!
//! This crate is used by both the server and the discovery client.
//! It has no dependencies on network sockets or HTTP frameworks.
//!
//! # Architecture overview
//!
//! - **`domain`** – Users, roles, role sets, and the one-way password hash.
//!   Plain data with the invariants the rest of the system relies on.
//!
//! - **`access`** – The per-operation authorization policy: "self or admin"
//!   for a subject's own record, "admin only" for directory-wide operations.
//!
//! - **`token`** – Issues and verifies HS256 session tokens.  Verification is
//!   a pure function of the token, the secret, and the current time.
//!
//! - **`protocol`** – The discovery query literal and the JSON response that
//!   travels back over UDP.

pub mod access;
pub mod domain;
pub mod protocol;
pub mod token;

// Re-export the most-used types at the crate root so callers can write
// `usvc_core::Claims` instead of `usvc_core::token::claims::Claims`.
pub use access::{require_admin, require_self_or_admin, AccessDenied, ADMIN_ROLE};
pub use domain::{
    password::{PasswordError, PasswordHash},
    role::{Role, RoleId, RoleSet},
    user::{User, UserId},
};
pub use protocol::discovery::{
    is_discovery_query, DiscoveryResponse, DEFAULT_MULTICAST_ADDR, DEFAULT_SERVICE_NAME,
    DISCOVERY_QUERY, MAX_QUERY_LEN,
};
pub use token::{Claims, TokenAuthority, TokenError, DEFAULT_TOKEN_VALIDITY};
