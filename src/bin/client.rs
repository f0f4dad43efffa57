//! Veiltun Client
//!
//! Runs the local SOCKS5/HTTP proxies and relays every accepted
//! connection through an encrypted tunnel to the remote relay endpoint,
//! reusing pooled transport connections across sessions.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use veiltun::config::Config;
use veiltun::proxy::{HttpProxyServer, ProxyError, Socks5Server};
use veiltun::relay::TunnelClient;
use veiltun::stats::RelayStats;

/// Veiltun Client - encrypted proxy tunnel relay
#[derive(Parser, Debug)]
#[command(name = "veiltun-client")]
#[command(about = "Veiltun Client - encrypted proxy tunnel relay")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Remote relay address (overrides config)
    #[arg(short, long)]
    server: Option<String>,

    /// Local SOCKS5 proxy address (overrides config)
    #[arg(long)]
    socks5: Option<String>,

    /// Local HTTP proxy address (overrides config)
    #[arg(long)]
    http: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(args.log_level.as_str())
        .init();

    // Load configuration
    let mut config = Config::load(&args.config).context("Failed to load configuration")?;

    if let Some(server) = args.server {
        config.client.server = server;
    }
    if config.client.password.is_empty() {
        error!("Shared passphrase not configured");
        return Err(anyhow!("Missing password in config"));
    }

    info!("Veiltun client v{}", veiltun::VERSION);
    info!("Remote relay: {}", config.client.server);
    info!("Cipher method: {}", config.client.method);
    info!(
        "Handshake padding: {}",
        if config.client.enable_padding { "on" } else { "off" }
    );

    let stats = Arc::new(RelayStats::new());
    let client = Arc::new(TunnelClient::new(&config.client, Arc::clone(&stats)));

    let socks5_addr = args.socks5.or_else(|| config.client.socks5_listen.clone());
    let http_addr = args.http.or_else(|| config.client.http_listen.clone());

    if socks5_addr.is_none() && http_addr.is_none() {
        return Err(anyhow!("No local proxy configured"));
    }

    // Start SOCKS5 proxy if configured
    if let Some(addr) = socks5_addr {
        let server = Socks5Server::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind SOCKS5 proxy on {}", addr))?;
        let client = Arc::clone(&client);

        tokio::spawn(async move {
            let result = server
                .run(move |stream, address| {
                    let client = Arc::clone(&client);
                    async move {
                        client
                            .relay_to(stream, &address.to_string())
                            .await
                            .map_err(|e| ProxyError::RelayFailed(e.to_string()))
                    }
                })
                .await;

            if let Err(e) = result {
                error!("SOCKS5 server error: {}", e);
            }
        });
    }

    // Start HTTP proxy if configured
    if let Some(addr) = http_addr {
        let server = HttpProxyServer::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP proxy on {}", addr))?;
        let client = Arc::clone(&client);

        tokio::spawn(async move {
            let result = server
                .run(move |stream, address| {
                    let client = Arc::clone(&client);
                    async move {
                        client
                            .relay_to(stream, &address.to_string())
                            .await
                            .map_err(|e| ProxyError::RelayFailed(e.to_string()))
                    }
                })
                .await;

            if let Err(e) = result {
                error!("HTTP proxy server error: {}", e);
            }
        });
    }

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    info!(
        "Lifetime totals: {} bytes sent, {} bytes received",
        stats.bytes_sent(),
        stats.bytes_received()
    );

    Ok(())
}
