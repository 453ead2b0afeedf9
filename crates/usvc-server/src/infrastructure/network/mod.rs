//! Network adapters other than HTTP.
//!
//! - **`discovery`** – UDP multicast responder that tells LAN peers where the
//!   HTTP API lives.

pub mod discovery;
