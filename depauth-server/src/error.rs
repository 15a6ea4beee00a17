//! HTTP error mapping for the signature service.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use depauth::SigningError;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An engine failure; the status depends on the variant.
    #[error(transparent)]
    Signing(#[from] SigningError),

    /// The requested block does not exist.
    #[error("block '{0}' not found")]
    BlockNotFound(String),

    /// The block id is neither `latest` nor a decimal height.
    #[error("invalid block id '{0}'")]
    InvalidBlockId(String),

    /// No stats have ever been recorded for the network.
    #[error("no stats recorded for network '{0}'")]
    UnknownStatsNetwork(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Signing(err) => match err {
                SigningError::MissingSigner(_) => StatusCode::NOT_FOUND,
                SigningError::Encoding(_) => StatusCode::BAD_REQUEST,
                SigningError::UpstreamRead(_) => StatusCode::BAD_GATEWAY,
                SigningError::Signer(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BlockNotFound(_) | Self::UnknownStatsNetwork(_) => StatusCode::NOT_FOUND,
            Self::InvalidBlockId(_) => StatusCode::BAD_REQUEST,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(SigningError::MissingSigner("bsc".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(SigningError::upstream(std::io::Error::other("rpc")).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_of(SigningError::Signer("rejected".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_of(ApiError::InvalidBlockId("abc".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::BlockNotFound("99".into())),
            StatusCode::NOT_FOUND
        );
    }
}
