// Allow dead code - some accessors exist for tests and API completeness
#![allow(dead_code)]

//! Lightning DNS Seed
//!
//! Bootstrap service for the Lightning Network: new nodes ask DNS for a
//! handful of reachable peers and connect from there.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    LIGHTNING DNS SEED                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Feed Poller (10s)          ←── lightningd listnodes       │
//! │  IRC Tailer                 ←── Signed NODE announcements  │
//! │  Peer Registry (memory)     ←── Latest record per node     │
//! │  DNS Server (53/udp)        ←── A / AAAA / SRV queries     │
//! │  HTTP API (8080)            ←── Metrics and monitoring     │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

mod announce;
mod api;
mod config;
mod crypto;
mod dns;
mod feed;
mod registry;
mod types;

use announce::{AnnouncementVerifier, IrcTailer};
use api::{ApiState, Metrics};
use config::SeedConfig;
use dns::{DnsServer, SeedDnsHandler};
use feed::{FeedPoller, LightningRpcFeed};
use registry::PeerRegistry;

/// Lightning DNS Seed - bootstrap peer discovery over DNS
#[derive(Parser, Debug)]
#[command(name = "ln-dns-seed")]
#[command(author = "ln-dns-seed Contributors")]
#[command(version)]
#[command(about = "DNS bootstrap seed for the Lightning Network", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lseed.toml")]
    config: PathBuf,

    /// Listen address for incoming DNS requests
    #[arg(long)]
    listen: Option<SocketAddr>,

    /// Root DNS seed domain
    #[arg(long)]
    root_domain: Option<String>,

    /// Time between polls to lightningd for updates (seconds)
    #[arg(long)]
    poll_interval: Option<u64>,

    /// The lightning directory
    #[arg(long)]
    lightning_dir: Option<PathBuf>,

    /// Network subdirectory holding the RPC socket
    #[arg(long)]
    network: Option<String>,

    /// Name of the lightning RPC socket
    #[arg(long)]
    rpc_file: Option<String>,

    /// How many results to return for an SRV query
    #[arg(long)]
    results: Option<usize>,

    /// HTTP API listen address
    #[arg(long)]
    api_listen: Option<SocketAddr>,

    /// Do not follow the IRC announcement channel
    #[arg(long)]
    no_irc: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Be very verbose (same as --log-level debug)
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.debug { "debug".to_string() } else { args.log_level.clone() };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| level.into())
        )
        .init();

    info!("⚡ Lightning DNS Seed v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = if args.config.exists() {
        SeedConfig::load(&args.config)
            .with_context(|| format!("Failed to load {}", args.config.display()))?
    } else {
        warn!("Config file {} not found, using defaults", args.config.display());
        SeedConfig::default()
    };

    // Override config with CLI args
    let irc_enabled = config.irc.enabled && !args.no_irc;
    let config = config
        .with_listen_addr(args.listen)
        .with_root_domain(args.root_domain)
        .with_poll_interval(args.poll_interval)
        .with_lightning_dir(args.lightning_dir)
        .with_network(args.network)
        .with_rpc_file(args.rpc_file)
        .with_max_results(args.results)
        .with_api_listen_addr(args.api_listen)
        .with_irc_enabled(irc_enabled)
        .validate()?;

    info!("⚙️  Configuration:");
    info!("   Root domain: {}", config.root_domain);
    info!("   DNS listen: {}", config.listen_addr);
    info!("   API listen: {}", config.api_listen_addr);
    info!("   lightningd socket: {}", config.rpc_socket_path().display());
    info!("   Poll interval: {}s", config.poll_interval_secs);
    info!("   SRV results: {}", config.max_results);

    let registry = Arc::new(PeerRegistry::new(config.default_port));
    let metrics = Arc::new(Metrics::new());

    // Bind sockets up front: a seed that cannot listen is useless
    let handler = Arc::new(SeedDnsHandler::new(
        registry.clone(),
        &config.root_domain,
        config.max_results,
        metrics.clone(),
    ));
    let dns_server = DnsServer::bind(config.listen_addr, handler)
        .await
        .with_context(|| format!("Failed to bind DNS socket {}", config.listen_addr))?;

    let api_listener = tokio::net::TcpListener::bind(config.api_listen_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP API {}", config.api_listen_addr))?;

    // Start all services concurrently
    let dns_handle = tokio::spawn(dns_server.run());

    let api_handle = tokio::spawn(api::run_api_server(
        api_listener,
        Arc::new(ApiState {
            root_domain: config.root_domain.clone(),
            registry: registry.clone(),
            metrics: metrics.clone(),
        }),
    ));

    let poller = FeedPoller::new(
        Box::new(LightningRpcFeed::new(config.rpc_socket_path())),
        registry.clone(),
        metrics.clone(),
        Duration::from_secs(config.poll_interval_secs),
    );
    let poller_handle = tokio::spawn(poller.run());

    let irc_handle = if config.irc.enabled {
        let verifier = Arc::new(AnnouncementVerifier::new(registry.clone(), metrics.clone()));
        let tailer = IrcTailer::new(config.irc.clone(), verifier, metrics.clone());
        Some(tokio::spawn(tailer.run()))
    } else {
        info!("IRC announcements disabled");
        None
    };
    let irc_exit = async {
        match irc_handle {
            Some(handle) => handle.await,
            None => std::future::pending().await,
        }
    };

    let status_handle = tokio::spawn(run_status_logger(
        registry.clone(),
        metrics.clone(),
        Duration::from_secs(config.status_interval_secs),
    ));

    info!("✅ All services started");
    info!("   Press Ctrl+C to shutdown");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("🛑 Shutdown signal received");
        }
        result = dns_handle => {
            error!("DNS server exited: {:?}", result);
        }
        result = api_handle => {
            error!("HTTP API exited: {:?}", result);
        }
        result = poller_handle => {
            error!("Feed poller exited: {:?}", result);
        }
        result = irc_exit => {
            error!("IRC tailer exited: {:?}", result);
        }
        result = status_handle => {
            error!("Status logger exited: {:?}", result);
        }
    }

    info!("👋 Lightning DNS Seed shutting down");
    Ok(())
}

/// Periodic status line
async fn run_status_logger(registry: Arc<PeerRegistry>, metrics: Arc<Metrics>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    // Nothing to report at startup
    interval.tick().await;

    loop {
        interval.tick().await;

        let stats = registry.stats();
        info!(
            "📊 Status: {} peers ({} IPv4, {} IPv6, {} on default port), {} queries answered, {} dropped",
            stats.total_peers,
            stats.ipv4_peers,
            stats.ipv6_peers,
            stats.default_port_peers,
            metrics.dns_queries_answered.load(std::sync::atomic::Ordering::Relaxed),
            metrics.dns_queries_dropped.load(std::sync::atomic::Ordering::Relaxed),
        );
    }
}
