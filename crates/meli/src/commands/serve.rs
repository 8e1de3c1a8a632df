//! Serve command - run the search proxy.

use std::net::SocketAddr;

use anyhow::{Context as _, Result};
use clap::Args;
use meli_oauth::{ProxyConfig, ProxyServer};

use super::{Context, build_dispatcher};

/// Arguments for the serve command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Address to bind to (overrides config)
    #[arg(short, long)]
    pub bind: Option<String>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = loaded.config;

    config
        .validate_credentials()
        .context("Cannot refresh tokens without OAuth credentials")?;

    let server_config = config.server();
    let bind = args.bind.unwrap_or(server_config.bind);
    let port = args.port.unwrap_or(server_config.port);
    let bind_addr: SocketAddr = format!("{}:{}", bind, port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", bind, port))?;

    if config.oauth().access_token.is_empty() {
        tracing::info!("No access token configured; the first search will trigger a refresh");
    }

    let dispatcher = build_dispatcher(&config)?;
    let proxy_config = ProxyConfig::new(bind_addr)
        .with_cors(server_config.enable_cors)
        .with_default_query(server_config.default_query);

    tracing::info!(
        search_url = %config.upstream().search_url,
        policy = ?dispatcher.policy(),
        "Search proxy configured"
    );

    let server = ProxyServer::new(proxy_config, dispatcher);

    tokio::select! {
        result = server.run() => result.context("Search proxy server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutting down"),
    }

    Ok(())
}
