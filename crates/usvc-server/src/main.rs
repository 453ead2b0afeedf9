//! User service entry point.
//!
//! Loads configuration, bootstraps the admin account, starts the HTTP API and
//! the discovery responder, and shuts both down on Ctrl-C.
//!
//! # Usage
//!
//! ```text
//! user-service [OPTIONS]
//!
//! Options:
//!   --config <PATH>              TOML config file [default: user-service.toml]
//!   --db-path <PATH>             SQLite credential database
//!   --listen <ADDR>              HTTP listen address
//!   --jwt-secret <SECRET>        Token signing secret
//!   --discovery-enabled <BOOL>   true/1/yes or false/0/no
//!   --discovery-addr <ADDR>      Multicast group, e.g. 239.255.255.250:9999
//! ```
//!
//! Every option can also be set through the environment variable shown in
//! `--help`.  CLI and environment take precedence over the config file.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use usvc_core::TokenAuthority;
use usvc_server::application::accounts::AccountService;
use usvc_server::infrastructure::http::build_router;
use usvc_server::infrastructure::network::discovery::{
    start_discovery_responder, DiscoveryOptions,
};
use usvc_server::infrastructure::storage::config::{load_config, parse_flag, ServerConfig};
use usvc_server::infrastructure::storage::SqliteStore;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Identity service with LAN discovery.
#[derive(Debug, Parser)]
#[command(
    name = "user-service",
    about = "User accounts, bearer tokens, and role-based access with LAN discovery",
    version
)]
struct Cli {
    /// Path to the TOML config file.  A missing file means built-in defaults.
    #[arg(long, default_value = "user-service.toml", env = "USER_CONFIG")]
    config: PathBuf,

    /// SQLite credential database, created if missing.
    #[arg(long, env = "USER_DB_PATH")]
    db_path: Option<PathBuf>,

    /// HTTP listen address, e.g. `0.0.0.0:8081`.
    #[arg(long, env = "USER_LISTEN_ADDR")]
    listen: Option<String>,

    /// HMAC secret for session tokens.
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Whether to answer discovery queries.
    #[arg(long, env = "DISCOVERY_ENABLED", value_parser = parse_flag)]
    discovery_enabled: Option<bool>,

    /// Multicast group and port for discovery.
    #[arg(long, env = "DISCOVERY_ADDR")]
    discovery_addr: Option<String>,
}

impl Cli {
    /// Loads the config file and applies CLI/env overrides on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be read or
    /// parsed, or if the merged config is invalid.
    fn into_server_config(self) -> anyhow::Result<ServerConfig> {
        let mut config = load_config(&self.config)
            .with_context(|| format!("failed to load config from {}", self.config.display()))?;

        if let Some(db_path) = self.db_path {
            config.storage.db_path = db_path;
        }
        if let Some(listen) = self.listen {
            config.server.listen_addr = listen;
        }
        if let Some(secret) = self.jwt_secret {
            config.auth.jwt_secret = secret;
        }
        if let Some(enabled) = self.discovery_enabled {
            config.discovery.enabled = enabled;
        }
        if let Some(addr) = self.discovery_addr {
            config.discovery.multicast_addr = addr;
        }
        config.validate()?;
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_server_config()?;

    // `RUST_LOG` wins over the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level)),
        )
        .init();

    info!("user service starting");
    if config.auth.uses_dev_secret() {
        warn!("using the built-in development JWT secret; set JWT_SECRET in production");
    }

    let tokens = Arc::new(
        TokenAuthority::new(config.auth.jwt_secret.as_bytes(), config.auth.token_validity())
            .context("invalid token settings")?,
    );
    let store = Arc::new(
        SqliteStore::open(&config.storage.db_path)
            .await
            .context("failed to open credential database")?,
    );
    let accounts = Arc::new(AccountService::new(store.clone(), tokens));

    if accounts
        .ensure_admin(
            &config.admin.email,
            &config.admin.password,
            &config.admin.full_name,
        )
        .await
        .context("failed to create bootstrap admin account")?
    {
        info!("bootstrap admin account {} created", config.admin.email);
    }

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", config.server.listen_addr))?;
    let http_addr = listener
        .local_addr()
        .context("failed to read HTTP listener address")?;
    info!("HTTP API listening on {http_addr}");

    // Shutdown flag shared with the discovery thread.
    let running = Arc::new(AtomicBool::new(true));

    // ── Discovery responder ───────────────────────────────────────────────────
    let discovery = match DiscoveryOptions::from_config(&config.discovery, http_addr.port())
        .and_then(|opts| start_discovery_responder(opts, Arc::clone(&running)))
    {
        Ok(handle) => handle,
        Err(e) => {
            error!("discovery unavailable: {e}");
            None
        }
    };

    // ── HTTP server with Ctrl-C shutdown ──────────────────────────────────────
    let shutdown = wait_for_shutdown(tokio::signal::ctrl_c(), Arc::clone(&running));

    let served = axum::serve(listener, build_router(accounts))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed");

    running.store(false, Ordering::Relaxed);
    if let Some(handle) = discovery {
        // Blocking join: at most one discovery read timeout.
        tokio::task::spawn_blocking(move || handle.stop())
            .await
            .context("discovery shutdown task failed")?;
    }

    store.close().await;
    info!("user service stopped");
    served
}

/// Resolves once `signal` fires, then clears `running`.
///
/// If the signal handler cannot be installed the service keeps running until
/// it is killed.
async fn wait_for_shutdown<F>(signal: F, running: Arc<AtomicBool>)
where
    F: Future<Output = std::io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!("failed to install Ctrl-C handler: {e}; stop the process to shut down");
            std::future::pending::<()>().await;
        }
    }
    running.store(false, Ordering::Relaxed);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
