//! Discovery datagram format.
//!
//! A client locates the service by sending the plain-text query
//! [`DISCOVERY_QUERY`] to the multicast group.  Each running service answers
//! with a single JSON datagram:
//!
//! ```json
//! {"service":"user-service","addr":"10.0.0.5","port":8081,"when":1700000000}
//! ```
//!
//! `addr` is an address the client can reach the service on, `port` is the
//! HTTP API port and `when` is the responder's clock in Unix seconds.

use serde::{Deserialize, Serialize};

/// Query payload.  Surrounding whitespace is tolerated on receipt.
pub const DISCOVERY_QUERY: &str = "DISCOVER_USER_SERVICE";

/// Multicast group and port the responder listens on by default.
pub const DEFAULT_MULTICAST_ADDR: &str = "239.255.255.250:9999";

/// Service name advertised in responses by default.
pub const DEFAULT_SERVICE_NAME: &str = "user-service";

/// Largest query datagram the responder reads.  Longer payloads are truncated
/// by the socket and will not match the query.
pub const MAX_QUERY_LEN: usize = 2048;

/// Returns `true` if `payload` is a discovery query.
///
/// The payload must be valid UTF-8 and equal [`DISCOVERY_QUERY`] once
/// leading and trailing whitespace is removed.  Matching is case-sensitive.
pub fn is_discovery_query(payload: &[u8]) -> bool {
    match std::str::from_utf8(payload) {
        Ok(text) => text.trim() == DISCOVERY_QUERY,
        Err(_) => false,
    }
}

/// A responder's answer to a discovery query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryResponse {
    /// Advertised service name.
    pub service: String,
    /// Address the querying client should use to reach the service.
    pub addr: String,
    /// HTTP API port.
    pub port: u16,
    /// Responder clock at reply time, Unix seconds.
    pub when: u64,
}

impl DiscoveryResponse {
    /// Encodes the response as a JSON datagram payload.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decodes a response datagram.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(payload)
    }
}
