//! Application layer use cases for the user service.
//!
//! Use cases in this layer orchestrate the domain types from `usvc_core`
//! against the [`CredentialStore`] abstraction.  They contain no HTTP and no
//! socket code; the infrastructure layer adapts them to the outside world.
//!
//! # Sub-modules
//!
//! - **`accounts`** – Registration, login, the user directory, and role
//!   management, each guarded by the access policy from `usvc_core::access`.
//!
//! [`CredentialStore`]: crate::infrastructure::storage::CredentialStore

pub mod accounts;
