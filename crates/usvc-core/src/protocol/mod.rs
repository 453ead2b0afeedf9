//! Wire formats shared between the service and its clients.

pub mod discovery;
