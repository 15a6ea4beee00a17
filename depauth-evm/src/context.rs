//! Per-network signing contexts.

use std::sync::Arc;
use std::time::Duration;

use depauth::SigningError;

use crate::codec::SignerLike;
use crate::reader::ChainSource;
use crate::resolver::ChainParams;

/// Everything the engine needs for one network: the signing key and the
/// cached chain parameter resolver. Immutable after construction.
///
/// Absence of a context for a requested network is
/// [`SigningError::MissingSigner`], not "network unknown" — the identifier
/// may be valid while the service simply holds no key for it.
pub struct NetworkContext {
    network: String,
    signer: Arc<dyn SignerLike>,
    params: ChainParams,
}

impl std::fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkContext")
            .field("network", &self.network)
            .field("signer", &self.signer.address())
            .finish_non_exhaustive()
    }
}

impl NetworkContext {
    /// Creates a context with its own per-network caches.
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        signer: Arc<dyn SignerLike>,
        source: Arc<dyn ChainSource>,
        block_ttl: Duration,
    ) -> Self {
        Self {
            network: network.into(),
            signer,
            params: ChainParams::new(source, block_ttl),
        }
    }

    /// The network identifier this context is bound to.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.network
    }

    /// The signing key holder.
    #[must_use]
    pub fn signer(&self) -> &Arc<dyn SignerLike> {
        &self.signer
    }

    /// The cached chain parameter resolver.
    #[must_use]
    pub const fn params(&self) -> &ChainParams {
        &self.params
    }
}
