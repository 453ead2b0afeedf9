//! # usvc-discover
//!
//! Locates a user service on the local network.
//!
//! [`query`] sends a single `DISCOVER_USER_SERVICE` datagram to the multicast
//! group and waits for one response.  There are no retries and no ranking:
//! the first responder to answer wins, and later answers are never read.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! let found = usvc_discover::query_default(Duration::from_secs(2))?;
//! println!("user service at http://{}:{}", found.addr, found.port);
//! # Ok::<(), usvc_discover::DiscoveryClientError>(())
//! ```

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use usvc_core::{DiscoveryResponse, DEFAULT_MULTICAST_ADDR, DISCOVERY_QUERY};

/// Largest response datagram accepted.  Responses are a few dozen bytes.
const MAX_RESPONSE_LEN: usize = 4096;

/// Error type for discovery queries.
#[derive(Debug, Error)]
pub enum DiscoveryClientError {
    /// The local ephemeral socket could not be created or configured.
    #[error("failed to bind discovery client socket: {0}")]
    Bind(#[source] std::io::Error),

    /// The query datagram could not be sent.
    #[error("failed to send discovery query to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// No response arrived within the timeout.
    #[error("no discovery response within {0:?}")]
    Timeout(Duration),

    /// Receiving failed for a reason other than the timeout.
    #[error("failed to receive discovery response: {0}")]
    Recv(#[source] std::io::Error),

    /// A datagram arrived but is not a discovery response.
    #[error("invalid discovery response from {from}: {source}")]
    Decode {
        from: SocketAddr,
        #[source]
        source: serde_json::Error,
    },

    /// The OS rejects a zero read timeout, and it would otherwise mean "wait forever".
    #[error("discovery timeout must be non-zero")]
    InvalidTimeout,
}

/// The default multicast group as a socket address.
pub fn default_group() -> SocketAddr {
    DEFAULT_MULTICAST_ADDR
        .parse()
        .unwrap_or_else(|_| SocketAddr::from((Ipv4Addr::new(239, 255, 255, 250), 9999)))
}

/// Queries [`DEFAULT_MULTICAST_ADDR`].
pub fn query_default(timeout: Duration) -> Result<DiscoveryResponse, DiscoveryClientError> {
    query(default_group(), timeout)
}

/// Sends one discovery query to `addr` and returns the first response.
///
/// Blocks for at most `timeout`.  `addr` may be the multicast group or the
/// unicast address of a single responder.
///
/// # Errors
///
/// Returns [`DiscoveryClientError::Timeout`] if nothing arrives in time and
/// [`DiscoveryClientError::Decode`] if the first datagram is not a response.
pub fn query(addr: SocketAddr, timeout: Duration) -> Result<DiscoveryResponse, DiscoveryClientError> {
    if timeout.is_zero() {
        return Err(DiscoveryClientError::InvalidTimeout);
    }

    let bind_addr: SocketAddr = match addr {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr).map_err(DiscoveryClientError::Bind)?;
    socket
        .set_read_timeout(Some(timeout))
        .map_err(DiscoveryClientError::Bind)?;

    socket
        .send_to(DISCOVERY_QUERY.as_bytes(), addr)
        .map_err(|source| DiscoveryClientError::Send { addr, source })?;
    debug!("discovery query sent to {addr}");

    let mut buf = [0u8; MAX_RESPONSE_LEN];
    let (len, from) = socket.recv_from(&mut buf).map_err(|e| {
        if is_timeout_error(&e) {
            DiscoveryClientError::Timeout(timeout)
        } else {
            DiscoveryClientError::Recv(e)
        }
    })?;

    let response = DiscoveryResponse::from_bytes(&buf[..len])
        .map_err(|source| DiscoveryClientError::Decode { from, source })?;
    debug!("discovery response from {from}: {response:?}");
    Ok(response)
}

fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
