//! Cached resolution of volatile chain parameters.
//!
//! [`ChainParams`] sits between the engine and a [`ChainSource`]: the latest
//! block is memoized under a short TTL, token decimals are memoized forever
//! (they do not change for a deployed contract), and deposit nonces pass
//! straight through because a stale nonce would produce a signature the
//! contract rejects.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use depauth::cache::CacheMachine;

use crate::error::ChainReadError;
use crate::reader::{BlockInfo, ChainSource};

const BLOCK_KEY: &str = "latest-block";

fn settings_key(contract: Address) -> String {
    format!("{contract}-contract-settings")
}

/// Per-network chain parameter resolver.
///
/// Each network carries its own caches so one network's block timestamp can
/// never leak into another's signature.
pub struct ChainParams {
    source: Arc<dyn ChainSource>,
    block_cache: CacheMachine<BlockInfo>,
    settings_cache: CacheMachine<u8>,
    block_ttl: Duration,
}

impl std::fmt::Debug for ChainParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainParams")
            .field("block_ttl", &self.block_ttl)
            .field("cached_blocks", &self.block_cache.len())
            .field("cached_settings", &self.settings_cache.len())
            .finish_non_exhaustive()
    }
}

impl ChainParams {
    /// Creates a resolver over `source` with the given latest-block TTL.
    #[must_use]
    pub fn new(source: Arc<dyn ChainSource>, block_ttl: Duration) -> Self {
        Self {
            source,
            block_cache: CacheMachine::new(),
            settings_cache: CacheMachine::new(),
            block_ttl,
        }
    }

    /// The underlying chain source, for reads that must never be cached.
    #[must_use]
    pub fn source(&self) -> &Arc<dyn ChainSource> {
        &self.source
    }

    /// Returns the latest block, memoized under the block TTL.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`ChainReadError`] on a miss.
    pub async fn current_block(&self) -> Result<BlockInfo, ChainReadError> {
        let source = Arc::clone(&self.source);
        self.block_cache
            .call(BLOCK_KEY, Some(self.block_ttl), || async move {
                source.latest_block().await
            })
            .await
    }

    /// Returns the decimals of a payment-gateway contract's token,
    /// memoized for the process lifetime.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`ChainReadError`] on a miss.
    pub async fn gateway_token_decimals(&self, contract: Address) -> Result<u8, ChainReadError> {
        let source = Arc::clone(&self.source);
        self.settings_cache
            .call(&settings_key(contract), None, || async move {
                let token = source.gateway_base_token(contract).await?;
                source.token_decimals(token).await
            })
            .await
    }

    /// Returns the decimals of a pro-rata contract's base token,
    /// memoized for the process lifetime.
    ///
    /// # Errors
    ///
    /// Propagates the source's [`ChainReadError`] on a miss.
    pub async fn pro_rata_token_decimals(&self, contract: Address) -> Result<u8, ChainReadError> {
        let source = Arc::clone(&self.source);
        self.settings_cache
            .call(&settings_key(contract), None, || async move {
                let token = source.pro_rata_base_token(contract).await?;
                source.token_decimals(token).await
            })
            .await
    }
}
