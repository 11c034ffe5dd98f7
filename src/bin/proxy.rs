//! Murmur proxy daemon
//!
//! Binds a local SOCKS5 listener over plain TCP and relays CONNECT sessions
//! until ctrl-c. Sessions already relaying at shutdown drain naturally.

use anyhow::{Context, Result};
use clap::Parser;
use murmur_proxy::config::Config;
use murmur_proxy::server::{Event, ProxyServer};
use murmur_proxy::transport::TcpTransport;
use std::sync::Arc;
use tracing::info;

/// Murmur Proxy - local SOCKS5 proxy over pluggable stream transports
#[derive(Parser, Debug)]
#[command(name = "murmur-proxy")]
#[command(about = "Local SOCKS5 proxy over pluggable stream transports")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listen address (overrides config)
    #[arg(short, long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = if std::path::Path::new(&args.config).exists() {
        Config::load(&args.config).context("Failed to load configuration")?
    } else {
        Config::default()
    };

    let log_level = args.log_level.unwrap_or_else(|| config.logging.level.clone());
    tracing_subscriber::fmt().with_env_filter(&log_level).init();

    let listen_addr = args.listen.unwrap_or_else(|| config.proxy.listen_addr());

    info!("murmur-proxy v{}", murmur_proxy::VERSION);

    let server = ProxyServer::start(Arc::new(TcpTransport::new()), &listen_addr)
        .await
        .context("Failed to start proxy")?;

    let mut events = server.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Log(line) => info!("{}", line),
                Event::Status(status) => {
                    info!(
                        running = status.running,
                        addr = %status.bind_addr,
                        port = status.port,
                        "status changed"
                    );
                }
            }
        }
    });

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for ctrl-c")?;
    info!("shutting down...");
    server.stop().await;

    Ok(())
}
