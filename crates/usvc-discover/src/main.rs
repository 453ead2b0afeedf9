//! `discover-client`: finds a user service on the LAN and prints where it is.
//!
//! ```text
//! $ discover-client --timeout-ms 1500
//! found: service=user-service addr=192.168.1.20 port=8081 when=1700000000
//! ```
//!
//! Exits non-zero if nothing answers in time.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use usvc_core::DEFAULT_MULTICAST_ADDR;

/// Sends one discovery query and prints the first response.
#[derive(Debug, Parser)]
#[command(
    name = "discover-client",
    about = "Locate a user service on the local network",
    version
)]
struct Cli {
    /// Multicast group (or a single responder's unicast address) to query.
    #[arg(long, default_value = DEFAULT_MULTICAST_ADDR, env = "DISCOVERY_ADDR")]
    addr: SocketAddr,

    /// How long to wait for a response, in milliseconds.
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout carries only the result line.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let found = usvc_discover::query(cli.addr, Duration::from_millis(cli.timeout_ms))
        .with_context(|| format!("discovery via {} failed", cli.addr))?;

    println!(
        "found: service={} addr={} port={} when={}",
        found.service, found.addr, found.port, found.when
    );
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
