//! Deposit signature authorization HTTP server.
//!
//! # Usage
//!
//! ```bash
//! # Run with default config (config.toml in current directory)
//! cargo run -p depauth-server --release
//!
//! # Run with custom config path
//! cargo run -p depauth-server -- --config /path/to/config.toml
//!
//! # Configure logging level
//! RUST_LOG=info cargo run -p depauth-server
//! ```
//!
//! # Environment Variables
//!
//! - `CONFIG` — Path to TOML configuration file (default: `config.toml`)
//! - `HOST` — Override bind address (default: `0.0.0.0`)
//! - `PORT` — Override port (default: `4030`)
//! - `RUST_LOG` — Log level filter (default: `info`)

use std::net::SocketAddr;
use std::sync::Arc;

use alloy_signer_local::PrivateKeySigner;
use axum::Router;
use axum::http::Method;
use clap::Parser;
use depauth_evm::{AlloyChainSource, NetworkContext, SignatureEngine, SignerLike, provider};
use tower_http::cors;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use url::Url;

use depauth_server::config::{NetworkConfig, ServerConfig};
use depauth_server::handlers::{AppState, api_router};

#[derive(Debug, Parser)]
#[command(name = "depauth-server", version, about = "Deposit signature authorization server")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(long, env = "CONFIG", default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("Server failed: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = ServerConfig::load_from(&args.config)?;
    tracing::info!(
        host = %config.host,
        port = config.port,
        networks = config.networks.len(),
        "Loaded configuration"
    );

    if config.networks.is_empty() {
        tracing::warn!("No networks configured — every signing request will be rejected");
    }

    let window = config.signing.window();
    let mut engine = SignatureEngine::new(window);

    for (network, net_cfg) in &config.networks {
        let key_str = net_cfg.signer_private_key.trim();
        if key_str.is_empty() || key_str.starts_with('$') {
            tracing::warn!(
                %network,
                "Skipping network: signer_private_key not resolved (missing env var?)"
            );
            continue;
        }

        let signer: PrivateKeySigner = key_str
            .parse()
            .map_err(|e| format!("Invalid signer key for {network}: {e}"))?;

        let endpoints = http_endpoints(network, net_cfg)?;
        if endpoints.is_empty() {
            tracing::warn!(%network, "Skipping network: no usable HTTP RPC endpoints");
            continue;
        }

        let root = provider::read_provider(network, &endpoints);
        let source = Arc::new(AlloyChainSource::new(root));

        tracing::info!(
            %network,
            signer = %signer.address(),
            endpoints = endpoints.len(),
            "Registered signing network"
        );
        engine.register(NetworkContext::new(
            network.clone(),
            Arc::new(signer) as Arc<dyn SignerLike>,
            source,
            window.block_ttl(),
        ));
    }

    let state: AppState = Arc::new(engine);

    let app = Router::new()
        .merge(api_router(Arc::clone(&state)))
        .layer(TraceLayer::new_for_http())
        .layer(
            cors::CorsLayer::new()
                .allow_origin(cors::Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(cors::Any),
        );

    let addr = SocketAddr::new(config.host, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Signature server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

/// Parses a network's configured RPC URLs, keeping only HTTP(S) endpoints.
///
/// The transport stack panics when handed zero endpoints, so non-HTTP URLs
/// must drop out here, before the caller's empty-endpoint skip.
fn http_endpoints(
    network: &str,
    config: &NetworkConfig,
) -> Result<Vec<(Url, Option<u32>)>, String> {
    let mut endpoints = Vec::with_capacity(config.rpc_urls.len());
    for raw in &config.rpc_urls {
        let url: Url = raw
            .parse()
            .map_err(|e| format!("Invalid RPC URL for {network}: {e}"))?;
        let scheme = url.scheme();
        if scheme != "http" && scheme != "https" {
            tracing::warn!(%network, rpc_url = %url, "Ignoring non-HTTP RPC endpoint");
            continue;
        }
        endpoints.push((url, config.rpc_rate_limit));
    }
    Ok(endpoints)
}

/// Waits for Ctrl-C or SIGTERM (Unix) to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down..."),
            _ = sigterm.recv() => tracing::info!("Received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl-C");
        tracing::info!("Received Ctrl-C, shutting down...");
    }
}
