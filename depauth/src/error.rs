//! Error types for deposit signature authorization.

use rust_decimal::Decimal;

/// Errors produced while handling a signature request.
///
/// Failures are recorded into the per-network stats at the request boundary
/// and re-raised unchanged to the caller; this crate never translates or
/// suppresses them. No partial signature is ever returned on failure.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    /// No signing context is registered for the requested network.
    ///
    /// This is a configuration error, distinct from "network unknown":
    /// the network identifier may be perfectly valid but the service has
    /// no private key for it. Fatal to the request, not worth retrying.
    #[error("no signer configured for network '{0}'")]
    MissingSigner(String),

    /// A chain-parameter fetch failed (RPC error, timeout, missing block).
    ///
    /// Transient; safe to retry at the caller's discretion.
    #[error("chain read failed: {0}")]
    UpstreamRead(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Amount conversion or timestamp narrowing failed.
    #[error(transparent)]
    Encoding(#[from] EncodingError),

    /// The signing key rejected the digest.
    #[error("signer failed: {0}")]
    Signer(String),
}

impl SigningError {
    /// Wraps an upstream chain-read failure, preserving it as the cause.
    pub fn upstream(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::UpstreamRead(err.into())
    }
}

/// Errors from converting values into their on-chain representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodingError {
    /// A deposit amount was negative.
    #[error("amount must not be negative: {0}")]
    NegativeAmount(Decimal),

    /// The amount does not fit the base-unit integer domain.
    #[error("amount overflows the base-unit range at {decimals} decimals")]
    AmountOverflow {
        /// The token decimal count used for scaling.
        decimals: u8,
    },

    /// A base-unit value cannot be represented as a decimal.
    #[error("base-unit value does not fit a decimal with {decimals} fractional digits")]
    PrecisionLoss {
        /// The token decimal count used for scaling.
        decimals: u8,
    },

    /// A computed timestamp limit exceeds the 32-bit domain used on-chain.
    #[error("timestamp {0} exceeds the unsigned 32-bit limit")]
    TimestampOverflow(u64),
}
