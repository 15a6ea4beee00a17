//! Solidity interface definitions for on-chain reads.
//!
//! Contains the minimal ABI surface the engine needs:
//! - [`IPaymentGateway`] — token accessor and per-user deposit nonce
//! - [`IProRata`] — base-token accessor and per-account deposit nonce
//! - [`IERC20`] — decimals lookup for amount scaling
//!
//! Only view functions are declared; this engine never submits transactions.

use alloy_sol_types::sol;

sol! {
    /// Read surface of the payment-gateway deposit contract.
    ///
    /// `getDepositNonce` keys replay protection by off-chain user ID.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IPaymentGateway {
        function erc20Token() external view returns (address);
        function getDepositNonce(string userId) external view returns (uint32);
    }
}

sol! {
    /// Read surface of the pro-rata allocation contract.
    ///
    /// `getNonce` keys replay protection by depositing account.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IProRata {
        function baseToken() external view returns (address);
        function getNonce(address account) external view returns (uint32);
    }
}

sol! {
    /// Minimal ERC-20 interface for decimals lookup.
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
    }
}
