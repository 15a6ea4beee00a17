//! JSON wire format for deposit signature requests and responses.
//!
//! All types serialize with camelCase field names. Human-unit amounts accept
//! either JSON numbers or strings; base-unit amounts serialize as decimal
//! strings since they routinely exceed what a JSON number can carry safely;
//! dates serialize as RFC 3339.

use alloy_primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use crate::policy::SigningMode;

/// Accepts a decimal amount from a JSON number or string.
fn de_decimal<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
    struct DecimalVisitor;

    impl serde::de::Visitor<'_> for DecimalVisitor {
        type Value = Decimal;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a decimal amount as a number or string")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Decimal, E> {
            Ok(Decimal::from(v))
        }

        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Decimal, E> {
            Decimal::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Decimal, E> {
            v.parse().map_err(E::custom)
        }
    }

    deserializer.deserialize_any(DecimalVisitor)
}

/// Request for a payment-gateway deposit signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDepositRequest {
    /// The payment-gateway contract the deposit targets.
    pub contract_address: Address,
    /// Off-chain user identifier embedded in the signed message.
    pub user_id: String,
    /// Idempotency tag understood by the contract, not by this engine.
    pub transaction_id: String,
    /// The depositing account.
    pub account: Address,
    /// Deposit amount in human units.
    #[serde(deserialize_with = "de_decimal")]
    pub amount: Decimal,
    /// Timing policy; defaults to window mode.
    #[serde(default)]
    pub mode: SigningMode,
}

/// Result of a payment-gateway deposit signature request.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDepositResponse {
    /// 0x-prefixed hex signature, recoverable to the network's signer.
    pub signature: String,
    /// Deposit amount converted to the token's base units.
    #[serde_as(as = "DisplayFromStr")]
    pub amount_in_wei: U256,
    /// The nonce embedded in the signature.
    pub nonce: u32,
    /// The anchoring block timestamp; absent in instant mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_now: Option<u64>,
    /// Latest block time at which the signature remains valid.
    pub timestamp_limit: u32,
    /// Human-readable deadline including the indexer offset.
    pub date_limit: DateTime<Utc>,
}

/// Request for a pro-rata deposit signature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProRataDepositRequest {
    /// The pro-rata contract the deposit targets.
    pub contract_address: Address,
    /// The depositing account.
    pub account: Address,
    /// Deposit amount in human units of the contract's base token.
    #[serde(deserialize_with = "de_decimal")]
    pub base_amount: Decimal,
    /// Whether the deposit opts into boosted allocation.
    pub boost: bool,
    /// Boost exchange rate in human units; scaled to 18 decimals on-chain.
    #[serde(deserialize_with = "de_decimal")]
    pub boost_exchange_rate: Decimal,
    /// Idempotency tag understood by the contract, not by this engine.
    pub transaction_id: String,
    /// Timing policy; defaults to window mode.
    #[serde(default)]
    pub mode: SigningMode,
}

/// Result of a pro-rata deposit signature request.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProRataDepositResponse {
    /// 0x-prefixed hex signature, recoverable to the network's signer.
    pub signature: String,
    /// Deposit amount converted to the base token's base units.
    #[serde_as(as = "DisplayFromStr")]
    pub base_amount_in_wei: U256,
    /// Boost exchange rate scaled to 18 decimals.
    #[serde_as(as = "DisplayFromStr")]
    pub boost_exchange_rate_in_wei: U256,
    /// The nonce embedded in the signature.
    pub nonce: u32,
    /// The anchoring block timestamp; absent in instant mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_now: Option<u64>,
    /// Latest block time at which the signature remains valid.
    pub timestamp_limit: u32,
    /// Human-readable deadline including the indexer offset.
    pub date_limit: DateTime<Utc>,
}

/// Request for the live payment-gateway deposit nonce of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayNonceRequest {
    /// The payment-gateway contract to query.
    pub contract_address: Address,
    /// Off-chain user identifier.
    pub user_id: String,
}

/// Request for the live pro-rata deposit nonce of an account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProRataNonceRequest {
    /// The pro-rata contract to query.
    pub contract_address: Address,
    /// The account to query.
    pub account: Address,
}

/// A live on-chain nonce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NonceResponse {
    /// The current deposit nonce.
    pub nonce: u32,
}

/// A block header summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResponse {
    /// Block height.
    pub number: u64,
    /// Block hash.
    pub hash: B256,
    /// Block timestamp in Unix seconds.
    pub timestamp: u64,
    /// Block timestamp as a date.
    pub timestamp_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_gateway_request_from_number_amount() {
        let request: GatewayDepositRequest = serde_json::from_str(
            r#"{
                "contractAddress": "0x4DAFFc8a2e8A5b80e1c1E15FD68c1F6E2855F1c1",
                "userId": "u-1",
                "transactionId": "tx-1",
                "account": "0x8ba1f109551bD432803012645Ac136ddd64DBA72",
                "amount": 100.5
            }"#,
        )
        .unwrap();
        assert_eq!(request.amount, Decimal::from_str("100.5").unwrap());
        assert_eq!(request.mode, SigningMode::Window);
    }

    #[test]
    fn test_gateway_request_from_string_amount_and_mode() {
        let request: GatewayDepositRequest = serde_json::from_str(
            r#"{
                "contractAddress": "0x4DAFFc8a2e8A5b80e1c1E15FD68c1F6E2855F1c1",
                "userId": "u-1",
                "transactionId": "tx-1",
                "account": "0x8ba1f109551bD432803012645Ac136ddd64DBA72",
                "amount": "0.000001",
                "mode": "instant"
            }"#,
        )
        .unwrap();
        assert_eq!(request.amount, Decimal::from_str("0.000001").unwrap());
        assert_eq!(request.mode, SigningMode::Instant);
    }

    #[test]
    fn test_gateway_response_wire_shape() {
        let response = GatewayDepositResponse {
            signature: "0xabcd".into(),
            amount_in_wei: U256::from(100u64) * U256::from(10).pow(U256::from(18)),
            nonce: 3,
            timestamp_now: Some(1_700_000_000),
            timestamp_limit: 1_700_000_300,
            date_limit: DateTime::from_timestamp(1_700_000_600, 0).unwrap(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["amountInWei"], "100000000000000000000");
        assert_eq!(json["timestampNow"], 1_700_000_000);
        assert_eq!(json["timestampLimit"], 1_700_000_300u32);
        assert!(json["dateLimit"].as_str().unwrap().starts_with("2023-11-14T"));
    }

    #[test]
    fn test_instant_response_omits_timestamp_now() {
        let response = GatewayDepositResponse {
            signature: "0xabcd".into(),
            amount_in_wei: U256::from(1u64),
            nonce: 0,
            timestamp_now: None,
            timestamp_limit: u32::MAX,
            date_limit: Utc::now(),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("timestampNow").is_none());
    }

    #[test]
    fn test_pro_rata_request_round_trip() {
        let request = ProRataDepositRequest {
            contract_address: Address::repeat_byte(0x11),
            account: Address::repeat_byte(0x22),
            base_amount: Decimal::from_str("5.25").unwrap(),
            boost: true,
            boost_exchange_rate: Decimal::from_str("0.3").unwrap(),
            transaction_id: "tx-9".into(),
            mode: SigningMode::Window,
        };
        let json = serde_json::to_string(&request).unwrap();
        let back: ProRataDepositRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.base_amount, request.base_amount);
        assert!(back.boost);
    }
}
