//! Infrastructure layer for the user service.
//!
//! Contains the outward-facing adapters: the HTTP API, the UDP discovery
//! responder, the credential store, and file-based configuration.
//!
//! **Dependency rule**: this layer may depend on `application` and `usvc_core`,
//! but the domain types in `usvc_core` never depend on it.  The one exception
//! is the [`storage::CredentialStore`] trait, which the application layer
//! programs against.

pub mod http;
pub mod network;
pub mod storage;
