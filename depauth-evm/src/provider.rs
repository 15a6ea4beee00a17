//! RPC client construction for read-only chain access.
//!
//! Endpoints are wrapped in a per-endpoint throttle layer and composed
//! behind a fallback layer, so one rate-limited or failing endpoint does
//! not take the network down with it.

use std::num::NonZeroUsize;

use alloy_provider::RootProvider;
use alloy_rpc_client::RpcClient;
use alloy_transport::layers::{FallbackLayer, ThrottleLayer};
use alloy_transport_http::Http;
use tower::ServiceBuilder;
use url::Url;

/// Creates an RPC client from HTTP endpoint URLs with optional per-endpoint
/// rate limits.
///
/// Each entry in `endpoints` is a `(url, optional_requests_per_second)`
/// pair. Non-HTTP(S) URLs are silently skipped.
///
/// # Panics
///
/// Panics if no valid HTTP transports remain after filtering.
#[must_use]
pub fn rpc_client(network: &str, endpoints: &[(Url, Option<u32>)]) -> RpcClient {
    let transports = endpoints
        .iter()
        .filter_map(|(url, rate_limit)| {
            let scheme = url.scheme();
            let is_http = scheme == "http" || scheme == "https";
            if !is_http {
                return None;
            }
            tracing::info!(network, rpc_url = %url, rate_limit = ?rate_limit, "Using HTTP transport");
            let limit = rate_limit.unwrap_or(u32::MAX);
            let service = ServiceBuilder::new()
                .layer(ThrottleLayer::new(limit))
                .service(Http::new(url.clone()));
            Some(service)
        })
        .collect::<Vec<_>>();
    let fallback = ServiceBuilder::new()
        .layer(
            FallbackLayer::default().with_active_transport_count(
                NonZeroUsize::new(transports.len())
                    .expect("Non-zero amount of stateless transports"),
            ),
        )
        .service(transports);
    RpcClient::new(fallback, false)
}

/// Creates a read-only provider over [`rpc_client`]'s transport stack.
///
/// The engine only issues view calls and block reads, so no wallet or
/// filler layers are attached.
///
/// # Panics
///
/// Panics if no valid HTTP transports remain after filtering.
#[must_use]
pub fn read_provider(network: &str, endpoints: &[(Url, Option<u32>)]) -> RootProvider {
    RootProvider::new(rpc_client(network, endpoints))
}
