//! Outbound chain reads behind the [`ChainSource`] trait.
//!
//! Everything the engine needs from a network goes through this trait:
//! latest block, token decimals, base-token accessors, and the live deposit
//! nonces. Keeping the seam here lets engine tests swap in a mock source
//! without touching RPC.

use alloy_primitives::{Address, B256};
use alloy_provider::{Provider, RootProvider};
use alloy_rpc_types_eth::BlockNumberOrTag;
use async_trait::async_trait;

use crate::contract::{IERC20, IPaymentGateway, IProRata};
use crate::error::ChainReadError;

/// A block header summary: the only block fields the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Block timestamp in Unix seconds.
    pub timestamp: u64,
}

/// Read access to the chain parameters a signature depends on.
///
/// Every method is a live read; caching happens above this trait in
/// [`ChainParams`](crate::resolver::ChainParams). Failures are transient
/// [`ChainReadError`]s and are never swallowed.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Returns the latest block.
    async fn latest_block(&self) -> Result<BlockInfo, ChainReadError>;

    /// Returns the block at `number`, or `None` if it does not exist.
    async fn block_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, ChainReadError>;

    /// Returns the decimal count of an ERC-20 token.
    async fn token_decimals(&self, token: Address) -> Result<u8, ChainReadError>;

    /// Returns the ERC-20 token a payment-gateway contract accepts.
    async fn gateway_base_token(&self, contract: Address) -> Result<Address, ChainReadError>;

    /// Returns the live deposit nonce of `user_id` on a payment-gateway
    /// contract.
    async fn gateway_deposit_nonce(
        &self,
        contract: Address,
        user_id: &str,
    ) -> Result<u32, ChainReadError>;

    /// Returns the base token a pro-rata contract accepts.
    async fn pro_rata_base_token(&self, contract: Address) -> Result<Address, ChainReadError>;

    /// Returns the live deposit nonce of `account` on a pro-rata contract.
    async fn pro_rata_deposit_nonce(
        &self,
        contract: Address,
        account: Address,
    ) -> Result<u32, ChainReadError>;
}

/// [`ChainSource`] over an alloy provider and the `sol!` contract bindings.
#[derive(Debug)]
pub struct AlloyChainSource {
    provider: RootProvider,
}

impl AlloyChainSource {
    /// Wraps a read-only provider.
    #[must_use]
    pub const fn new(provider: RootProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainSource for AlloyChainSource {
    async fn latest_block(&self) -> Result<BlockInfo, ChainReadError> {
        self.block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or(ChainReadError::MissingLatestBlock)
    }

    async fn block_by_number(
        &self,
        number: BlockNumberOrTag,
    ) -> Result<Option<BlockInfo>, ChainReadError> {
        let block = self.provider.get_block_by_number(number).await?;
        Ok(block.map(|block| BlockInfo {
            number: block.header.number,
            hash: block.header.hash,
            timestamp: block.header.timestamp,
        }))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8, ChainReadError> {
        let token = IERC20::new(token, &self.provider);
        Ok(token.decimals().call().await?)
    }

    async fn gateway_base_token(&self, contract: Address) -> Result<Address, ChainReadError> {
        let gateway = IPaymentGateway::new(contract, &self.provider);
        Ok(gateway.erc20Token().call().await?)
    }

    async fn gateway_deposit_nonce(
        &self,
        contract: Address,
        user_id: &str,
    ) -> Result<u32, ChainReadError> {
        let gateway = IPaymentGateway::new(contract, &self.provider);
        Ok(gateway.getDepositNonce(user_id.to_owned()).call().await?)
    }

    async fn pro_rata_base_token(&self, contract: Address) -> Result<Address, ChainReadError> {
        let pro_rata = IProRata::new(contract, &self.provider);
        Ok(pro_rata.baseToken().call().await?)
    }

    async fn pro_rata_deposit_nonce(
        &self,
        contract: Address,
        account: Address,
    ) -> Result<u32, ChainReadError> {
        let pro_rata = IProRata::new(contract, &self.provider);
        Ok(pro_rata.getNonce(account).call().await?)
    }
}
