//! Deposit message encoding and signing.
//!
//! Each deposit family signs a fixed ordered tuple of typed fields,
//! packed-encoded (`abi.encodePacked` semantics), keccak-256 hashed, and
//! signed over the EIP-191 personal-message prefix so the contract can
//! recover the signer with `ecrecover` on the prefixed digest.
//!
//! The field order and types below are a hard contract with the verifying
//! side: any reordering or retyping invalidates every signature.

use alloy_primitives::utils::eip191_hash_message;
use alloy_primitives::{Address, B256, Signature, U256, hex, keccak256};
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use depauth::SigningError;

/// An opaque key-holder able to sign a 32-byte digest.
///
/// The engine never reads the raw private key; a signature is a pure
/// function of signer and digest, so implementations may be shared across
/// concurrent requests without locking.
#[async_trait]
pub trait SignerLike: Send + Sync {
    /// The address signatures recover to.
    fn address(&self) -> Address;

    /// Signs a prefixed digest.
    ///
    /// # Errors
    ///
    /// Returns [`SigningError::Signer`] if the key rejects the digest.
    async fn sign_digest(&self, digest: B256) -> Result<Signature, SigningError>;
}

#[async_trait]
impl SignerLike for PrivateKeySigner {
    fn address(&self) -> Address {
        Self::address(self)
    }

    async fn sign_digest(&self, digest: B256) -> Result<Signature, SigningError> {
        alloy_signer::Signer::sign_hash(self, &digest)
            .await
            .map_err(|err| SigningError::Signer(err.to_string()))
    }
}

/// The signed tuple of a payment-gateway deposit.
///
/// Packed as `(string userId, string transactionId, address account,
/// uint256 amount, uint32 nonce, uint32 timestampLimit)`.
#[derive(Debug, Clone, Copy)]
pub struct GatewayDepositMessage<'a> {
    /// Off-chain user identifier.
    pub user_id: &'a str,
    /// Contract-level idempotency tag.
    pub transaction_id: &'a str,
    /// The depositing account.
    pub account: Address,
    /// Deposit amount in base units.
    pub amount: U256,
    /// Per-user deposit nonce.
    pub nonce: u32,
    /// Latest valid block time.
    pub timestamp_limit: u32,
}

impl GatewayDepositMessage<'_> {
    /// The packed encoding of the tuple.
    #[must_use]
    pub fn packed(&self) -> Vec<u8> {
        (
            self.user_id,
            self.transaction_id,
            self.account,
            self.amount,
            self.nonce,
            self.timestamp_limit,
        )
            .abi_encode_packed()
    }

    /// The EIP-191 prefixed digest of the packed tuple's keccak hash.
    #[must_use]
    pub fn digest(&self) -> B256 {
        eip191_hash_message(keccak256(self.packed()))
    }
}

/// The signed tuple of a pro-rata deposit.
///
/// Packed as `(address account, uint256 baseAmount, bool boost,
/// uint256 boostExchangeRate, uint32 nonce, string transactionId,
/// uint32 timestampLimit)`.
#[derive(Debug, Clone, Copy)]
pub struct ProRataDepositMessage<'a> {
    /// The depositing account.
    pub account: Address,
    /// Deposit amount in base units of the contract's base token.
    pub base_amount: U256,
    /// Whether the deposit opts into boosted allocation.
    pub boost: bool,
    /// Boost exchange rate scaled to 18 decimals.
    pub boost_exchange_rate: U256,
    /// Per-account deposit nonce.
    pub nonce: u32,
    /// Contract-level idempotency tag.
    pub transaction_id: &'a str,
    /// Latest valid block time.
    pub timestamp_limit: u32,
}

impl ProRataDepositMessage<'_> {
    /// The packed encoding of the tuple.
    #[must_use]
    pub fn packed(&self) -> Vec<u8> {
        (
            self.account,
            self.base_amount,
            self.boost,
            self.boost_exchange_rate,
            self.nonce,
            self.transaction_id,
            self.timestamp_limit,
        )
            .abi_encode_packed()
    }

    /// The EIP-191 prefixed digest of the packed tuple's keccak hash.
    #[must_use]
    pub fn digest(&self) -> B256 {
        eip191_hash_message(keccak256(self.packed()))
    }
}

/// Signs a digest and returns the 0x-prefixed hex of the 65-byte
/// `r || s || v` encoding, `v` in `{27, 28}`.
///
/// # Errors
///
/// Returns [`SigningError::Signer`] if the key rejects the digest.
pub async fn sign_digest_hex(
    signer: &dyn SignerLike,
    digest: B256,
) -> Result<String, SigningError> {
    let signature = signer.sign_digest(digest).await?;
    Ok(hex::encode_prefixed(signature.as_bytes()))
}
