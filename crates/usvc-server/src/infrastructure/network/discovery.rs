//! UDP multicast discovery responder.
//!
//! The responder binds a UDP socket on the discovery port, joins the
//! multicast group (default `239.255.255.250:9999`), and answers every
//! `DISCOVER_USER_SERVICE` datagram with a unicast JSON response carrying the
//! address and port of the HTTP API:
//!
//! ```text
//! client ──"DISCOVER_USER_SERVICE"──► 239.255.255.250:9999
//! client ◄──{"service","addr","port","when"}── responder (unicast to source)
//! ```
//!
//! The responder runs on a dedicated thread so synchronous socket I/O never
//! blocks the Tokio runtime.
//!
//! # Read timeout
//!
//! `recv_from` blocks for at most the configured read timeout (default 2 s).
//! On each timeout the loop re-checks the shared `running` flag, so shutdown
//! completes within one timeout of [`DiscoveryHandle::stop`].
//!
//! # Several instances on one host
//!
//! The socket is bound with `SO_REUSEADDR`, so more than one service instance
//! can listen on the group port.  Multicast queries reach every instance; a
//! unicast query reaches only one of them.
//!
//! # Hosts without multicast
//!
//! Joining the group can fail, e.g. on a host whose only interface is
//! loopback.  The responder then logs a warning and keeps answering queries
//! sent directly (unicast) to its port.

use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::JoinHandle;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tracing::{debug, error, info, trace, warn};
use usvc_core::{is_discovery_query, token::unix_now, DiscoveryResponse, MAX_QUERY_LEN};

use crate::infrastructure::storage::config::DiscoveryConfig;

/// Error type for starting the discovery responder.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The UDP socket could not be bound.
    #[error("failed to bind discovery socket on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The configured group address is not `<ipv4>:<port>`.
    #[error("invalid discovery address '{0}'")]
    InvalidAddress(String),

    /// A zero read timeout would turn the loop into a busy spin.
    #[error("discovery read timeout must be non-zero")]
    InvalidTimeout,

    /// The OS refused to create the responder thread.
    #[error("failed to spawn discovery thread: {0}")]
    Spawn(#[source] std::io::Error),
}

/// Everything the responder needs, resolved from config plus the bound HTTP port.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    pub enabled: bool,
    pub group: SocketAddrV4,
    pub service_name: String,
    /// HTTP API port reported to clients.
    pub service_port: u16,
    pub read_timeout: Duration,
}

impl DiscoveryOptions {
    /// Resolves options from `config`, advertising `service_port`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::InvalidAddress`] if `multicast_addr` does not
    /// parse as an IPv4 socket address.
    pub fn from_config(config: &DiscoveryConfig, service_port: u16) -> Result<Self, DiscoveryError> {
        let group = config
            .multicast_addr
            .parse::<SocketAddrV4>()
            .map_err(|_| DiscoveryError::InvalidAddress(config.multicast_addr.clone()))?;
        Ok(Self {
            enabled: config.enabled,
            group,
            service_name: config.service_name.clone(),
            service_port,
            read_timeout: config.read_timeout(),
        })
    }
}

/// Owner of a running responder thread.
///
/// Dropping the handle clears the running flag without waiting; call
/// [`stop`](Self::stop) to wait for the thread to exit and release its socket.
#[derive(Debug)]
pub struct DiscoveryHandle {
    local_addr: SocketAddr,
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    /// Address the responder socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Signals the responder to stop and waits for its thread to exit.
    pub fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("discovery responder thread panicked");
            }
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

/// Binds the discovery socket and spawns the responder thread.
///
/// Returns `Ok(None)` without touching the network when discovery is disabled.
/// The thread runs until `running` is cleared.
///
/// # Errors
///
/// Returns [`DiscoveryError::BindFailed`] if the socket cannot be bound.
pub fn start_discovery_responder(
    options: DiscoveryOptions,
    running: Arc<AtomicBool>,
) -> Result<Option<DiscoveryHandle>, DiscoveryError> {
    if !options.enabled {
        info!("discovery disabled");
        return Ok(None);
    }
    if options.read_timeout.is_zero() {
        return Err(DiscoveryError::InvalidTimeout);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, options.group.port()));
    let socket =
        bind_shared(addr).map_err(|source| DiscoveryError::BindFailed { addr, source })?;
    let local_addr = socket
        .local_addr()
        .map_err(|source| DiscoveryError::BindFailed { addr, source })?;

    if let Err(e) = socket.join_multicast_v4(options.group.ip(), &Ipv4Addr::UNSPECIFIED) {
        warn!(
            "could not join multicast group {}: {e}; answering unicast queries only",
            options.group.ip()
        );
    }
    socket
        .set_read_timeout(Some(options.read_timeout))
        .map_err(|source| DiscoveryError::BindFailed { addr, source })?;

    let thread_running = Arc::clone(&running);
    let thread = std::thread::Builder::new()
        .name("usvc-discovery".to_string())
        .spawn(move || responder_loop(socket, &options, &thread_running))
        .map_err(DiscoveryError::Spawn)?;

    info!("discovery responder listening on UDP {local_addr}");
    Ok(Some(DiscoveryHandle {
        local_addr,
        running,
        thread: Some(thread),
    }))
}

/// Binds a UDP socket that other instances may bind as well.
fn bind_shared(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// The receive loop executed on the discovery thread.
fn responder_loop(socket: UdpSocket, options: &DiscoveryOptions, running: &AtomicBool) {
    let mut buf = vec![0u8; MAX_QUERY_LEN];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                warn!("discovery recv error: {e}");
                continue;
            }
        };

        if !is_discovery_query(&buf[..len]) {
            trace!("ignoring {len}-byte datagram from {src}");
            continue;
        }

        let response = DiscoveryResponse {
            service: options.service_name.clone(),
            addr: reachable_local_ip(src).to_string(),
            port: options.service_port,
            when: unix_now(),
        };
        match response.to_bytes() {
            Ok(bytes) => match socket.send_to(&bytes, src) {
                Ok(_) => debug!("answered discovery query from {src} with {}", response.addr),
                Err(e) => warn!("failed to send discovery response to {src}: {e}"),
            },
            Err(e) => error!("failed to encode discovery response: {e}"),
        }
    }

    info!("discovery responder stopped");
}

/// Returns the local IP the OS would use to reach `peer`.
///
/// Connecting a UDP socket sends nothing; it only fixes the route, which is
/// enough for `local_addr` to report the outgoing interface address.  Falls
/// back to `127.0.0.1` if no route is found.
fn reachable_local_ip(peer: SocketAddr) -> IpAddr {
    let bind_addr: SocketAddr = match peer {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    UdpSocket::bind(bind_addr)
        .and_then(|probe| {
            probe.connect(peer)?;
            probe.local_addr()
        })
        .map(|local| local.ip())
        .ok()
        .filter(|ip| !ip.is_unspecified())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
