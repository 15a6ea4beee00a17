//! Timing policy for signature validity windows.
//!
//! Every signature embeds a nonce and a timestamp limit that the verifying
//! contract checks on-chain. The policy decides, per request, how those are
//! derived:
//!
//! - **Window mode** (default): the nonce is read live from the contract and
//!   the timestamp limit is anchored to the current block time plus a fixed
//!   validity window.
//! - **Instant mode**: no chain reads; the nonce is fixed at zero and the
//!   timestamp limit is the maximum representable 32-bit value. Only valid
//!   for contracts that enforce replay protection by transaction identifier
//!   rather than by nonce and time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EncodingError;

/// The nonce embedded in instant-mode signatures.
pub const INSTANT_NONCE: u32 = 0;

/// The timestamp limit embedded in instant-mode signatures: effectively
/// unbounded within the contract's 32-bit time domain.
pub const UNBOUNDED_TIMESTAMP_LIMIT: u32 = u32::MAX;

/// How the nonce and timestamp limit of a signature are derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SigningMode {
    /// Block-anchored validity window with a live on-chain nonce.
    #[default]
    Window,
    /// Fixed zero nonce and unbounded timestamp limit; no chain reads.
    Instant,
}

/// The fixed durations governing window-mode signatures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningWindow {
    /// How long a signature stays valid past the anchoring block timestamp.
    pub validity_secs: u64,
    /// Slack added to the human-facing deadline to cover indexer lag
    /// between issuance and on-chain confirmation visibility.
    pub indexer_offset_secs: u64,
}

impl Default for SigningWindow {
    fn default() -> Self {
        Self {
            validity_secs: 300,
            indexer_offset_secs: 300,
        }
    }
}

impl SigningWindow {
    /// TTL for the cached latest block: one-tenth of the validity window,
    /// keeping chain reads infrequent while the anchored timestamp stays
    /// well inside the window.
    #[must_use]
    pub const fn block_ttl(&self) -> Duration {
        Duration::from_millis(self.validity_secs * 1000 / 10)
    }

    /// Computes the on-chain timestamp limit for a window-mode signature.
    ///
    /// # Errors
    ///
    /// Returns [`EncodingError::TimestampOverflow`] if the limit does not
    /// fit the contract's unsigned 32-bit time domain.
    pub fn timestamp_limit(&self, block_timestamp: u64) -> Result<u32, EncodingError> {
        let limit = block_timestamp.saturating_add(self.validity_secs);
        u32::try_from(limit).map_err(|_| EncodingError::TimestampOverflow(limit))
    }

    /// Computes the human-readable deadline: wall-clock now plus the
    /// validity window plus the indexer offset. Wall-clock, not chain time.
    #[must_use]
    pub fn date_limit(&self) -> DateTime<Utc> {
        let slack = self.validity_secs.saturating_add(self.indexer_offset_secs);
        let slack = i64::try_from(slack).unwrap_or(i64::MAX);
        Utc::now() + chrono::Duration::seconds(slack)
    }
}
