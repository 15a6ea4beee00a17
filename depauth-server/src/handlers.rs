//! Axum route handlers for the signature service.
//!
//! Endpoints mirror the deposit authorization API:
//!
//! - `POST /{network}/payment-gateway-contract/deposit-signature`
//! - `POST /{network}/payment-gateway-contract/deposit-signature-instant`
//! - `POST /{network}/payment-gateway-contract/nonce`
//! - `POST /{network}/pro-rata-contract/deposit-signature`
//! - `POST /{network}/pro-rata-contract/nonce`
//! - `GET /{network}/blocks/{id}`
//! - `GET /indexer/{network}/stats`
//! - `GET /health`

use std::sync::Arc;

use alloy_rpc_types_eth::BlockNumberOrTag;
use axum::extract::{Path, State};
use axum::{Json, Router, routing};
use chrono::DateTime;
use depauth::SigningMode;
use depauth::proto::{
    BlockResponse, GatewayDepositRequest, GatewayDepositResponse, GatewayNonceRequest,
    NonceResponse, ProRataDepositRequest, ProRataDepositResponse, ProRataNonceRequest,
};
use depauth::stats::StatsSnapshot;
use depauth_evm::SignatureEngine;

use crate::error::ApiError;

/// Shared application state.
pub type AppState = Arc<SignatureEngine>;

/// `POST /{network}/payment-gateway-contract/deposit-signature`
///
/// # Errors
///
/// Returns 404 for unconfigured networks, 400 on encoding failures,
/// and 502 on upstream chain failures.
pub async fn gateway_deposit_signature(
    State(engine): State<AppState>,
    Path(network): Path<String>,
    Json(request): Json<GatewayDepositRequest>,
) -> Result<Json<GatewayDepositResponse>, ApiError> {
    tracing::info!(%network, "payment-gateway-contract.deposit-signature");
    let response = engine.gateway_deposit_signature(&network, &request).await?;
    Ok(Json(response))
}

/// `POST /{network}/payment-gateway-contract/deposit-signature-instant`
///
/// Forces instant mode regardless of the body's `mode` field; the route is
/// kept for compatibility with clients of the original API.
///
/// # Errors
///
/// As for [`gateway_deposit_signature`].
pub async fn gateway_deposit_signature_instant(
    State(engine): State<AppState>,
    Path(network): Path<String>,
    Json(mut request): Json<GatewayDepositRequest>,
) -> Result<Json<GatewayDepositResponse>, ApiError> {
    tracing::info!(%network, "payment-gateway-contract.deposit-signature-instant");
    request.mode = SigningMode::Instant;
    let response = engine.gateway_deposit_signature(&network, &request).await?;
    Ok(Json(response))
}

/// `POST /{network}/payment-gateway-contract/nonce`
///
/// # Errors
///
/// Returns 404 for unconfigured networks and 502 on upstream failures.
pub async fn gateway_nonce(
    State(engine): State<AppState>,
    Path(network): Path<String>,
    Json(request): Json<GatewayNonceRequest>,
) -> Result<Json<NonceResponse>, ApiError> {
    tracing::info!(%network, "payment-gateway-contract.nonce");
    Ok(Json(engine.gateway_nonce(&network, &request).await?))
}

/// `POST /{network}/pro-rata-contract/deposit-signature`
///
/// # Errors
///
/// As for [`gateway_deposit_signature`].
pub async fn pro_rata_deposit_signature(
    State(engine): State<AppState>,
    Path(network): Path<String>,
    Json(request): Json<ProRataDepositRequest>,
) -> Result<Json<ProRataDepositResponse>, ApiError> {
    tracing::info!(%network, "pro-rata-contract.deposit-signature");
    let response = engine.pro_rata_deposit_signature(&network, &request).await?;
    Ok(Json(response))
}

/// `POST /{network}/pro-rata-contract/nonce`
///
/// # Errors
///
/// Returns 404 for unconfigured networks and 502 on upstream failures.
pub async fn pro_rata_nonce(
    State(engine): State<AppState>,
    Path(network): Path<String>,
    Json(request): Json<ProRataNonceRequest>,
) -> Result<Json<NonceResponse>, ApiError> {
    tracing::info!(%network, "pro-rata-contract.nonce");
    Ok(Json(engine.pro_rata_nonce(&network, &request).await?))
}

/// `GET /{network}/blocks/{id}` — `id` is `latest` or a decimal height.
///
/// # Errors
///
/// Returns 400 for malformed ids and 404 when the block does not exist.
pub async fn get_block(
    State(engine): State<AppState>,
    Path((network, id)): Path<(String, String)>,
) -> Result<Json<BlockResponse>, ApiError> {
    tracing::info!(%network, %id, "network.blocks.id");
    let number = parse_block_id(&id)?;
    let block = engine
        .block(&network, number)
        .await?
        .ok_or_else(|| ApiError::BlockNotFound(id))?;

    let timestamp_date = i64::try_from(block.timestamp)
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_default();
    Ok(Json(BlockResponse {
        number: block.number,
        hash: block.hash,
        timestamp: block.timestamp,
        timestamp_date,
    }))
}

fn parse_block_id(id: &str) -> Result<BlockNumberOrTag, ApiError> {
    if id == "latest" {
        return Ok(BlockNumberOrTag::Latest);
    }
    id.parse::<u64>()
        .map(BlockNumberOrTag::Number)
        .map_err(|_| ApiError::InvalidBlockId(id.to_owned()))
}

/// `GET /indexer/{network}/stats`
///
/// # Errors
///
/// Returns 404 if nothing was ever recorded for the network.
pub async fn get_stats(
    State(engine): State<AppState>,
    Path(network): Path<String>,
) -> Result<Json<StatsSnapshot>, ApiError> {
    tracing::info!(%network, "indexer.network.stats");
    engine
        .stats(&network)
        .map(Json)
        .ok_or(ApiError::UnknownStatsNetwork(network))
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Creates the service router with all endpoints.
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/{network}/payment-gateway-contract/deposit-signature",
            routing::post(gateway_deposit_signature),
        )
        .route(
            "/{network}/payment-gateway-contract/deposit-signature-instant",
            routing::post(gateway_deposit_signature_instant),
        )
        .route(
            "/{network}/payment-gateway-contract/nonce",
            routing::post(gateway_nonce),
        )
        .route(
            "/{network}/pro-rata-contract/deposit-signature",
            routing::post(pro_rata_deposit_signature),
        )
        .route(
            "/{network}/pro-rata-contract/nonce",
            routing::post(pro_rata_nonce),
        )
        .route("/{network}/blocks/{id}", routing::get(get_block))
        .route("/indexer/{network}/stats", routing::get(get_stats))
        .route("/health", routing::get(health))
        .with_state(state)
}
