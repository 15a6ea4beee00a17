//! The request-level deposit signature engine.
//!
//! One engine serves every configured network. A request names a network;
//! the engine looks up that network's [`NetworkContext`], resolves the
//! chain parameters its timing mode needs (concurrently, through the
//! per-network caches), encodes and signs the deposit message, and records
//! the outcome into the per-network stats. Failures are recorded and then
//! re-raised unchanged; no partial signature is ever returned.

use std::collections::HashMap;

use alloy_rpc_types_eth::BlockNumberOrTag;
use depauth::policy::{INSTANT_NONCE, UNBOUNDED_TIMESTAMP_LIMIT};
use depauth::proto::{
    GatewayDepositRequest, GatewayDepositResponse, GatewayNonceRequest, NonceResponse,
    ProRataDepositRequest, ProRataDepositResponse, ProRataNonceRequest,
};
use depauth::stats::{StatsRegistry, StatsSnapshot};
use depauth::{SigningError, SigningMode, SigningWindow, amount};

use crate::codec::{self, GatewayDepositMessage, ProRataDepositMessage};
use crate::context::NetworkContext;
use crate::reader::BlockInfo;

/// Fixed fractional precision of the pro-rata boost exchange rate,
/// independent of the deposit token's decimals.
const RATE_DECIMALS: u8 = 18;

/// Nonce, anchoring timestamp, and limit selected by the timing policy.
#[derive(Debug, Clone, Copy)]
struct Timing {
    nonce: u32,
    timestamp_now: Option<u64>,
    timestamp_limit: u32,
}

/// The deposit signature authorization engine.
///
/// Holds the per-network signing contexts (built once at startup), the
/// shared stats registry, and the timing policy durations.
#[derive(Debug)]
pub struct SignatureEngine {
    contexts: HashMap<String, NetworkContext>,
    stats: StatsRegistry,
    window: SigningWindow,
}

impl SignatureEngine {
    /// Creates an engine with no registered networks.
    #[must_use]
    pub fn new(window: SigningWindow) -> Self {
        Self {
            contexts: HashMap::new(),
            stats: StatsRegistry::new(),
            window,
        }
    }

    /// Registers a network context, replacing any previous one for the
    /// same network.
    pub fn register(&mut self, context: NetworkContext) {
        self.stats.track(context.network());
        self.contexts
            .insert(context.network().to_owned(), context);
    }

    /// The timing policy durations this engine signs under.
    #[must_use]
    pub const fn window(&self) -> SigningWindow {
        self.window
    }

    /// Returns the stats snapshot for `network`, or `None` if the network
    /// has never been registered nor requested.
    #[must_use]
    pub fn stats(&self, network: &str) -> Option<StatsSnapshot> {
        self.stats.snapshot(network)
    }

    fn context(&self, network: &str) -> Result<&NetworkContext, SigningError> {
        self.contexts
            .get(network)
            .ok_or_else(|| SigningError::MissingSigner(network.to_owned()))
    }

    /// Issues a payment-gateway deposit signature.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] on any failure; the per-network error
    /// counter is incremented and the error propagates unchanged.
    pub async fn gateway_deposit_signature(
        &self,
        network: &str,
        request: &GatewayDepositRequest,
    ) -> Result<GatewayDepositResponse, SigningError> {
        match self.gateway_deposit_inner(network, request).await {
            Ok(response) => {
                self.stats.record_signature(network);
                tracing::info!(
                    network,
                    contract = %request.contract_address,
                    mode = ?request.mode,
                    nonce = response.nonce,
                    "issued payment-gateway deposit signature"
                );
                Ok(response)
            }
            Err(err) => {
                self.stats.record_error(network, &err);
                tracing::warn!(
                    network,
                    contract = %request.contract_address,
                    error = %err,
                    "payment-gateway deposit signature failed"
                );
                Err(err)
            }
        }
    }

    async fn gateway_deposit_inner(
        &self,
        network: &str,
        request: &GatewayDepositRequest,
    ) -> Result<GatewayDepositResponse, SigningError> {
        let context = self.context(network)?;
        let params = context.params();

        let (decimals, timing) = match request.mode {
            SigningMode::Window => {
                // The three reads are independent; issue them together. The
                // nonce intentionally bypasses the caches.
                let (block, decimals, nonce) = tokio::try_join!(
                    params.current_block(),
                    params.gateway_token_decimals(request.contract_address),
                    params
                        .source()
                        .gateway_deposit_nonce(request.contract_address, &request.user_id),
                )?;
                (decimals, self.window_timing(block.timestamp, nonce)?)
            }
            SigningMode::Instant => {
                let decimals = params
                    .gateway_token_decimals(request.contract_address)
                    .await?;
                (decimals, Self::instant_timing())
            }
        };

        let amount_in_wei = amount::to_base_units(request.amount, decimals)?;
        let message = GatewayDepositMessage {
            user_id: &request.user_id,
            transaction_id: &request.transaction_id,
            account: request.account,
            amount: amount_in_wei,
            nonce: timing.nonce,
            timestamp_limit: timing.timestamp_limit,
        };
        let signature = codec::sign_digest_hex(context.signer().as_ref(), message.digest()).await?;

        Ok(GatewayDepositResponse {
            signature,
            amount_in_wei,
            nonce: timing.nonce,
            timestamp_now: timing.timestamp_now,
            timestamp_limit: timing.timestamp_limit,
            date_limit: self.window.date_limit(),
        })
    }

    /// Issues a pro-rata deposit signature.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError`] on any failure; the per-network error
    /// counter is incremented and the error propagates unchanged.
    pub async fn pro_rata_deposit_signature(
        &self,
        network: &str,
        request: &ProRataDepositRequest,
    ) -> Result<ProRataDepositResponse, SigningError> {
        match self.pro_rata_deposit_inner(network, request).await {
            Ok(response) => {
                self.stats.record_signature(network);
                tracing::info!(
                    network,
                    contract = %request.contract_address,
                    mode = ?request.mode,
                    nonce = response.nonce,
                    "issued pro-rata deposit signature"
                );
                Ok(response)
            }
            Err(err) => {
                self.stats.record_error(network, &err);
                tracing::warn!(
                    network,
                    contract = %request.contract_address,
                    error = %err,
                    "pro-rata deposit signature failed"
                );
                Err(err)
            }
        }
    }

    async fn pro_rata_deposit_inner(
        &self,
        network: &str,
        request: &ProRataDepositRequest,
    ) -> Result<ProRataDepositResponse, SigningError> {
        let context = self.context(network)?;
        let params = context.params();

        let (decimals, timing) = match request.mode {
            SigningMode::Window => {
                let (block, decimals, nonce) = tokio::try_join!(
                    params.current_block(),
                    params.pro_rata_token_decimals(request.contract_address),
                    params
                        .source()
                        .pro_rata_deposit_nonce(request.contract_address, request.account),
                )?;
                (decimals, self.window_timing(block.timestamp, nonce)?)
            }
            SigningMode::Instant => {
                let decimals = params
                    .pro_rata_token_decimals(request.contract_address)
                    .await?;
                (decimals, Self::instant_timing())
            }
        };

        let base_amount_in_wei = amount::to_base_units(request.base_amount, decimals)?;
        let boost_exchange_rate_in_wei =
            amount::to_base_units(request.boost_exchange_rate, RATE_DECIMALS)?;
        let message = ProRataDepositMessage {
            account: request.account,
            base_amount: base_amount_in_wei,
            boost: request.boost,
            boost_exchange_rate: boost_exchange_rate_in_wei,
            nonce: timing.nonce,
            transaction_id: &request.transaction_id,
            timestamp_limit: timing.timestamp_limit,
        };
        let signature = codec::sign_digest_hex(context.signer().as_ref(), message.digest()).await?;

        Ok(ProRataDepositResponse {
            signature,
            base_amount_in_wei,
            boost_exchange_rate_in_wei,
            nonce: timing.nonce,
            timestamp_now: timing.timestamp_now,
            timestamp_limit: timing.timestamp_limit,
            date_limit: self.window.date_limit(),
        })
    }

    fn window_timing(&self, block_timestamp: u64, nonce: u32) -> Result<Timing, SigningError> {
        Ok(Timing {
            nonce,
            timestamp_now: Some(block_timestamp),
            timestamp_limit: self.window.timestamp_limit(block_timestamp)?,
        })
    }

    const fn instant_timing() -> Timing {
        Timing {
            nonce: INSTANT_NONCE,
            timestamp_now: None,
            timestamp_limit: UNBOUNDED_TIMESTAMP_LIMIT,
        }
    }

    /// Returns the live payment-gateway deposit nonce. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::MissingSigner`] for unregistered networks
    /// and [`SigningError::UpstreamRead`] on chain failures.
    pub async fn gateway_nonce(
        &self,
        network: &str,
        request: &GatewayNonceRequest,
    ) -> Result<NonceResponse, SigningError> {
        let context = self.context(network)?;
        let nonce = context
            .params()
            .source()
            .gateway_deposit_nonce(request.contract_address, &request.user_id)
            .await?;
        Ok(NonceResponse { nonce })
    }

    /// Returns the live pro-rata deposit nonce. Never cached.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::MissingSigner`] for unregistered networks
    /// and [`SigningError::UpstreamRead`] on chain failures.
    pub async fn pro_rata_nonce(
        &self,
        network: &str,
        request: &ProRataNonceRequest,
    ) -> Result<NonceResponse, SigningError> {
        let context = self.context(network)?;
        let nonce = context
            .params()
            .source()
            .pro_rata_deposit_nonce(request.contract_address, request.account)
            .await?;
        Ok(NonceResponse { nonce })
    }

    /// Returns the block at `number`, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::MissingSigner`] for unregistered networks
    /// and [`SigningError::UpstreamRead`] on chain failures.
    pub async fn block(
        &self,
        network: &str,
        number: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, SigningError> {
        let context = self.context(network)?;
        Ok(context.params().source().block_by_number(number).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};

    use alloy_primitives::{Address, B256, Signature, U256, hex};
    use alloy_signer_local::PrivateKeySigner;
    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use crate::codec::SignerLike;
    use crate::error::ChainReadError;
    use crate::reader::ChainSource;

    const TIMESTAMP: u64 = 1_700_000_000;

    #[derive(Debug, Default)]
    struct MockChainSource {
        nonce: AtomicU32,
        fail_reads: AtomicBool,
        block_fetches: AtomicUsize,
        decimals_fetches: AtomicUsize,
        nonce_fetches: AtomicUsize,
        timestamp: AtomicU64,
    }

    impl MockChainSource {
        fn new() -> Self {
            let source = Self::default();
            source.timestamp.store(TIMESTAMP, Ordering::SeqCst);
            source.nonce.store(3, Ordering::SeqCst);
            source
        }

        fn fail(&self) -> Result<(), ChainReadError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                Err(ChainReadError::MissingLatestBlock)
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl ChainSource for MockChainSource {
        async fn latest_block(&self) -> Result<BlockInfo, ChainReadError> {
            self.fail()?;
            self.block_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(BlockInfo {
                number: 100,
                hash: B256::repeat_byte(0xbb),
                timestamp: self.timestamp.load(Ordering::SeqCst),
            })
        }

        async fn block_by_number(
            &self,
            number: BlockNumberOrTag,
        ) -> Result<Option<BlockInfo>, ChainReadError> {
            self.fail()?;
            match number {
                BlockNumberOrTag::Number(n) if n > 100 => Ok(None),
                _ => Ok(Some(BlockInfo {
                    number: 100,
                    hash: B256::repeat_byte(0xbb),
                    timestamp: self.timestamp.load(Ordering::SeqCst),
                })),
            }
        }

        async fn token_decimals(&self, _token: Address) -> Result<u8, ChainReadError> {
            self.fail()?;
            self.decimals_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(18)
        }

        async fn gateway_base_token(&self, _contract: Address) -> Result<Address, ChainReadError> {
            self.fail()?;
            Ok(Address::repeat_byte(0xee))
        }

        async fn gateway_deposit_nonce(
            &self,
            _contract: Address,
            _user_id: &str,
        ) -> Result<u32, ChainReadError> {
            self.fail()?;
            self.nonce_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.nonce.load(Ordering::SeqCst))
        }

        async fn pro_rata_base_token(&self, _contract: Address) -> Result<Address, ChainReadError> {
            self.fail()?;
            Ok(Address::repeat_byte(0xee))
        }

        async fn pro_rata_deposit_nonce(
            &self,
            _contract: Address,
            _account: Address,
        ) -> Result<u32, ChainReadError> {
            self.fail()?;
            self.nonce_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self.nonce.load(Ordering::SeqCst))
        }
    }

    fn engine_with(source: &Arc<MockChainSource>) -> (SignatureEngine, Arc<PrivateKeySigner>) {
        let signer = Arc::new(PrivateKeySigner::random());
        let mut engine = SignatureEngine::new(SigningWindow::default());
        let window = engine.window();
        engine.register(NetworkContext::new(
            "bsc",
            Arc::clone(&signer) as Arc<dyn SignerLike>,
            Arc::clone(source) as Arc<dyn ChainSource>,
            window.block_ttl(),
        ));
        (engine, signer)
    }

    fn gateway_request() -> GatewayDepositRequest {
        GatewayDepositRequest {
            contract_address: Address::repeat_byte(0x11),
            user_id: "u-1".into(),
            transaction_id: "tx-1".into(),
            account: Address::repeat_byte(0x22),
            amount: Decimal::from_str("100").unwrap(),
            mode: SigningMode::Window,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_mode_signs_with_live_parameters() {
        let source = Arc::new(MockChainSource::new());
        let (engine, signer) = engine_with(&source);

        let response = engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap();

        assert_eq!(
            response.amount_in_wei,
            U256::from(100u64) * U256::from(10).pow(U256::from(18))
        );
        assert_eq!(response.nonce, 3);
        assert_eq!(response.timestamp_now, Some(TIMESTAMP));
        assert_eq!(
            u64::from(response.timestamp_limit),
            TIMESTAMP + engine.window().validity_secs
        );

        let message = GatewayDepositMessage {
            user_id: "u-1",
            transaction_id: "tx-1",
            account: Address::repeat_byte(0x22),
            amount: response.amount_in_wei,
            nonce: response.nonce,
            timestamp_limit: response.timestamp_limit,
        };
        let raw = hex::decode(&response.signature).unwrap();
        let recovered = Signature::from_raw(&raw)
            .unwrap()
            .recover_address_from_prehash(&message.digest())
            .unwrap();
        assert_eq!(recovered, SignerLike::address(signer.as_ref()));

        let stats = engine.stats("bsc").unwrap();
        assert_eq!(stats.signatures, 1);
        assert_eq!(stats.error_count, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_and_decimals_cached_but_nonce_live() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap();
        source.nonce.store(4, Ordering::SeqCst);
        let response = engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap();

        // Second request inside the TTL reuses the block and decimals but
        // sees the advanced nonce.
        assert_eq!(source.block_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.decimals_fetches.load(Ordering::SeqCst), 1);
        assert_eq!(source.nonce_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(response.nonce, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_refetched_after_ttl() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap();
        tokio::time::advance(engine.window().block_ttl() + std::time::Duration::from_secs(1)).await;
        source.timestamp.store(TIMESTAMP + 31, Ordering::SeqCst);

        let response = engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap();
        assert_eq!(source.block_fetches.load(Ordering::SeqCst), 2);
        assert_eq!(response.timestamp_now, Some(TIMESTAMP + 31));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instant_mode_skips_block_and_nonce() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        let mut request = gateway_request();
        request.mode = SigningMode::Instant;
        let response = engine
            .gateway_deposit_signature("bsc", &request)
            .await
            .unwrap();

        assert_eq!(response.nonce, 0);
        assert_eq!(response.timestamp_limit, u32::MAX);
        assert_eq!(response.timestamp_now, None);
        assert_eq!(source.block_fetches.load(Ordering::SeqCst), 0);
        assert_eq!(source.nonce_fetches.load(Ordering::SeqCst), 0);
        assert_eq!(source.decimals_fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_network_fails_before_chain_calls() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        let err = engine
            .gateway_deposit_signature("polygon", &gateway_request())
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::MissingSigner(network) if network == "polygon"));
        assert_eq!(source.block_fetches.load(Ordering::SeqCst), 0);
        assert_eq!(engine.stats("polygon").unwrap().error_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_upstream_failure_counts_one_error() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);
        source.fail_reads.store(true, Ordering::SeqCst);

        let err = engine
            .gateway_deposit_signature("bsc", &gateway_request())
            .await
            .unwrap_err();
        assert!(matches!(err, SigningError::UpstreamRead(_)));

        let stats = engine.stats("bsc").unwrap();
        assert_eq!(stats.error_count, 1);
        assert_eq!(stats.signatures, 0);
        assert!(stats.last_error.is_some());
        assert!(stats.last_error_date.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pro_rata_window_mode() {
        let source = Arc::new(MockChainSource::new());
        let (engine, signer) = engine_with(&source);

        let request = ProRataDepositRequest {
            contract_address: Address::repeat_byte(0x33),
            account: Address::repeat_byte(0x44),
            base_amount: Decimal::from_str("5.5").unwrap(),
            boost: true,
            boost_exchange_rate: Decimal::from_str("0.25").unwrap(),
            transaction_id: "tx-9".into(),
            mode: SigningMode::Window,
        };
        let response = engine
            .pro_rata_deposit_signature("bsc", &request)
            .await
            .unwrap();

        assert_eq!(
            response.base_amount_in_wei,
            U256::from(55u64) * U256::from(10).pow(U256::from(17))
        );
        // The rate scales at a fixed 18 decimals regardless of the token.
        assert_eq!(
            response.boost_exchange_rate_in_wei,
            U256::from(25u64) * U256::from(10).pow(U256::from(16))
        );
        assert_eq!(response.nonce, 3);

        let message = ProRataDepositMessage {
            account: request.account,
            base_amount: response.base_amount_in_wei,
            boost: true,
            boost_exchange_rate: response.boost_exchange_rate_in_wei,
            nonce: response.nonce,
            transaction_id: "tx-9",
            timestamp_limit: response.timestamp_limit,
        };
        let raw = hex::decode(&response.signature).unwrap();
        let recovered = Signature::from_raw(&raw)
            .unwrap()
            .recover_address_from_prehash(&message.digest())
            .unwrap();
        assert_eq!(recovered, SignerLike::address(signer.as_ref()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_nonce_endpoints_bypass_cache() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        let request = GatewayNonceRequest {
            contract_address: Address::repeat_byte(0x11),
            user_id: "u-1".into(),
        };
        assert_eq!(engine.gateway_nonce("bsc", &request).await.unwrap().nonce, 3);
        source.nonce.store(9, Ordering::SeqCst);
        assert_eq!(engine.gateway_nonce("bsc", &request).await.unwrap().nonce, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_block_lookup() {
        let source = Arc::new(MockChainSource::new());
        let (engine, _signer) = engine_with(&source);

        let block = engine
            .block("bsc", BlockNumberOrTag::Latest)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(block.number, 100);

        let absent = engine
            .block("bsc", BlockNumberOrTag::Number(10_000))
            .await
            .unwrap();
        assert!(absent.is_none());
    }
}
