//! Chain-read error types.

use depauth::SigningError;

/// Errors from reading chain parameters over RPC.
///
/// All variants are transient from the engine's point of view: the request
/// fails as a whole and the caller may retry.
#[derive(Debug, thiserror::Error)]
pub enum ChainReadError {
    /// RPC transport failure (connection, timeout, malformed response).
    #[error(transparent)]
    Transport(#[from] alloy_transport::TransportError),

    /// A contract view call failed or returned undecodable data.
    #[error(transparent)]
    Contract(#[from] alloy_contract::Error),

    /// The RPC endpoint reported no latest block.
    #[error("rpc endpoint returned no latest block")]
    MissingLatestBlock,
}

impl From<ChainReadError> for SigningError {
    fn from(err: ChainReadError) -> Self {
        Self::upstream(err)
    }
}
