//! Per-network operational statistics.
//!
//! Every signature request, success or failure, updates the counters for its
//! network. Updates are a side effect of the response path: they apply
//! in-memory under the entry lock and never block or fail the request.
//! Only the most recent error is retained.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

/// Mutable counters for one network. Process lifetime only.
#[derive(Debug, Clone)]
pub struct NetworkStats {
    /// Cumulative signatures issued.
    pub signatures: u64,
    /// Cumulative failed requests.
    pub error_count: u64,
    /// Message of the most recent error.
    pub last_error: Option<String>,
    /// Formatted cause chain of the most recent error, when it has one.
    pub last_error_stack: Option<String>,
    /// When the most recent error occurred.
    pub last_error_date: Option<DateTime<Utc>>,
    /// When counting started for this network.
    pub start_date: DateTime<Utc>,
}

impl NetworkStats {
    fn new() -> Self {
        Self {
            signatures: 0,
            error_count: 0,
            last_error: None,
            last_error_stack: None,
            last_error_date: None,
            start_date: Utc::now(),
        }
    }
}

/// A point-in-time view of one network's counters, with derived rates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    /// Cumulative signatures issued.
    pub signatures: u64,
    /// Cumulative failed requests.
    pub error_count: u64,
    /// Message of the most recent error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Formatted cause chain of the most recent error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_stack: Option<String>,
    /// When the most recent error occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_date: Option<DateTime<Utc>>,
    /// When counting started.
    pub start_date: DateTime<Utc>,
    /// Seconds since counting started.
    pub uptime_secs: u64,
    /// Signatures per second since counting started.
    pub signatures_per_sec: f64,
}

/// Registry of per-network counters.
///
/// Networks are keyed by identifier; entries appear on first touch (either
/// at engine registration or on the first request). Recording is infallible
/// and never masks the error being recorded.
#[derive(Debug, Default)]
pub struct StatsRegistry {
    networks: DashMap<String, NetworkStats>,
}

impl StatsRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a counter entry exists for `network`.
    pub fn track(&self, network: &str) {
        self.update(network, |_| {});
    }

    /// Applies a partial update to `network`'s counters under the entry
    /// lock. Fields the closure does not touch keep their values.
    pub fn update<F: FnOnce(&mut NetworkStats)>(&self, network: &str, patch: F) {
        let mut entry = self
            .networks
            .entry(network.to_owned())
            .or_insert_with(NetworkStats::new);
        patch(&mut entry);
    }

    /// Records one issued signature.
    pub fn record_signature(&self, network: &str) {
        self.update(network, |stats| stats.signatures += 1);
    }

    /// Records one failed request with the error's message, best-effort
    /// cause chain, and the failure instant.
    pub fn record_error(&self, network: &str, err: &(dyn std::error::Error + 'static)) {
        let message = err.to_string();
        let stack = cause_chain(err);
        self.update(network, |stats| {
            stats.error_count += 1;
            stats.last_error = Some(message);
            stats.last_error_stack = stack;
            stats.last_error_date = Some(Utc::now());
        });
    }

    /// Returns a snapshot for `network`, or `None` if nothing has ever been
    /// recorded for it.
    #[must_use]
    pub fn snapshot(&self, network: &str) -> Option<StatsSnapshot> {
        let stats = self.networks.get(network)?;
        let uptime_secs = u64::try_from((Utc::now() - stats.start_date).num_seconds()).unwrap_or(0);
        let signatures_per_sec = stats.signatures as f64 / uptime_secs.max(1) as f64;
        Some(StatsSnapshot {
            signatures: stats.signatures,
            error_count: stats.error_count,
            last_error: stats.last_error.clone(),
            last_error_stack: stats.last_error_stack.clone(),
            last_error_date: stats.last_error_date,
            start_date: stats.start_date,
            uptime_secs,
            signatures_per_sec,
        })
    }
}

/// Formats an error's `source()` chain, the closest analogue of a stack
/// trace available without capturing backtraces.
fn cause_chain(err: &(dyn std::error::Error + 'static)) -> Option<String> {
    let mut cause = err.source()?;
    let mut chain = format!("caused by: {cause}");
    while let Some(next) = cause.source() {
        chain.push_str(&format!("\ncaused by: {next}"));
        cause = next;
    }
    Some(chain)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SigningError;

    #[test]
    fn test_signature_counter_increments() {
        let registry = StatsRegistry::new();
        registry.record_signature("bsc");
        registry.record_signature("bsc");

        let snapshot = registry.snapshot("bsc").unwrap();
        assert_eq!(snapshot.signatures, 2);
        assert_eq!(snapshot.error_count, 0);
        assert!(snapshot.last_error.is_none());
    }

    #[test]
    fn test_error_recording_is_partial() {
        let registry = StatsRegistry::new();
        registry.record_signature("bsc");

        let err = SigningError::MissingSigner("bsc".into());
        registry.record_error("bsc", &err);

        let snapshot = registry.snapshot("bsc").unwrap();
        // The error patch leaves the signature counter untouched.
        assert_eq!(snapshot.signatures, 1);
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(
            snapshot.last_error.as_deref(),
            Some("no signer configured for network 'bsc'")
        );
        assert!(snapshot.last_error_date.is_some());
    }

    #[test]
    fn test_cause_chain_captures_source() {
        let io = std::io::Error::other("connection reset");
        let err = SigningError::upstream(io);

        let registry = StatsRegistry::new();
        registry.record_error("bsc", &err);

        let snapshot = registry.snapshot("bsc").unwrap();
        assert_eq!(
            snapshot.last_error_stack.as_deref(),
            Some("caused by: connection reset")
        );
    }

    #[test]
    fn test_unknown_network_has_no_snapshot() {
        let registry = StatsRegistry::new();
        assert!(registry.snapshot("unknown").is_none());
    }

    #[test]
    fn test_networks_are_isolated() {
        let registry = StatsRegistry::new();
        registry.record_signature("bsc");
        registry.track("polygon");

        assert_eq!(registry.snapshot("bsc").unwrap().signatures, 1);
        assert_eq!(registry.snapshot("polygon").unwrap().signatures, 0);
    }
}
