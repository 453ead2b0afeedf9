//! Domain records for the user service.
//!
//! Plain data plus the invariants layered on it: unique role names, set
//! semantics for role membership, and a password hash that can be compared
//! but never serialized or printed.

pub mod password;
pub mod role;
pub mod user;
