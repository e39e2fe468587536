use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use obra_registry::RegistryError;

use super::json_error;

/// Everything a route can fail with.
#[derive(Debug)]
pub(crate) enum ApiError {
    LedgerNotConnected,
    BadRequest(String),
    Timeout(Duration),
    Registry(RegistryError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::LedgerNotConnected => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Registry(e) => match e {
                RegistryError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
                RegistryError::NotFound { .. } => StatusCode::NOT_FOUND,
                RegistryError::LedgerUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ApiError::LedgerNotConnected => "ledger not connected",
            ApiError::BadRequest(_) => "bad request",
            ApiError::Timeout(_) => "request timed out",
            ApiError::Registry(e) => match e {
                RegistryError::InvalidArgument(_) => "invalid argument",
                RegistryError::NotFound { .. } => "obra not found",
                RegistryError::LedgerUnavailable(_) => "ledger unavailable",
                RegistryError::MalformedPayload { .. } => "malformed payload",
                RegistryError::NoSigningIdentity => "no signing account",
                RegistryError::TransactionFailed { .. } => "transaction failed",
                RegistryError::EventNotFound { .. } => "event not found",
                RegistryError::NumericOverflow { .. } => "numeric overflow",
                RegistryError::VerificationFailed { .. } => "verification failed",
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::LedgerNotConnected => {
                "the registry contract is not deployed or the node is unreachable".to_string()
            }
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Timeout(limit) => format!("ledger did not answer within {:?}", limit),
            ApiError::Registry(e) => e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.message(), "request failed");
        }
        json_error(status, self.label(), &self.message()).into_response()
    }
}
