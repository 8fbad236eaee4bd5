use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use freshscan_shared::api::ErrorBody;
use freshscan_shared::TokenError;
use freshscan_store::StoreError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidInput(String),

    #[error("Invalid email or secret")]
    InvalidCredentials,

    #[error("Authentication required")]
    Unauthenticated,

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Not found")]
    NotFound,

    #[error("An account with this email already exists")]
    DuplicateAccount,

    #[error("File too large (max {max} bytes)")]
    PayloadTooLarge { max: u64 },

    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Blob storage error: {0}")]
    BlobStorage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable machine-readable kind sent to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::InvalidInput(_) => "invalid_input",
            ServerError::InvalidCredentials => "invalid_credentials",
            ServerError::Unauthenticated => "unauthenticated",
            ServerError::Token(TokenError::Expired) => "token_expired",
            ServerError::Token(TokenError::Invalid) => "token_invalid",
            ServerError::NotFound => "not_found",
            ServerError::DuplicateAccount => "duplicate_account",
            ServerError::PayloadTooLarge { .. } => "payload_too_large",
            ServerError::UnsupportedType(_) => "unsupported_type",
            ServerError::AnalysisFailed(_) => "analysis_failed",
            ServerError::BlobStorage(_) | ServerError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::InvalidInput(_)
            | ServerError::PayloadTooLarge { .. }
            | ServerError::UnsupportedType(_) => StatusCode::BAD_REQUEST,
            ServerError::InvalidCredentials
            | ServerError::Unauthenticated
            | ServerError::Token(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::DuplicateAccount => StatusCode::CONFLICT,
            ServerError::AnalysisFailed(_)
            | ServerError::BlobStorage(_)
            | ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ServerError::NotFound,
            StoreError::DuplicateAccount => ServerError::DuplicateAccount,
            StoreError::InvalidQuery(msg) => ServerError::InvalidInput(msg),
            // The token outlived its account.
            StoreError::OwnerMissing => ServerError::Unauthenticated,
            other => ServerError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ServerError::BlobStorage(detail) | ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            ServerError::AnalysisFailed(detail) => {
                tracing::warn!(error = %detail, "Analysis failed");
                "Analysis failed".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            kind: self.kind().to_string(),
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}
