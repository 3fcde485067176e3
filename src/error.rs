/// Unified error types for the TrustMesh binding service
use crate::binding::BindError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the HTTP surface and process bootstrap
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Request validation errors
    #[error("Invalid input: {message}")]
    Validation {
        message: String,
        details: Option<serde_json::Value>,
    },

    /// Proof of control did not verify
    #[error("Unauthorized: Invalid proof")]
    Unauthorized,

    /// Proof kind requires a capability that is switched off
    #[error("Not Implemented: {0} is disabled")]
    CapabilityDisabled(String),

    /// Rate limiting errors
    #[error("{message}")]
    RateLimitExceeded {
        message: &'static str,
        retry_after: std::time::Duration,
    },

    /// Configuration errors (startup only)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation {
            message: message.into(),
            details: None,
        }
    }
}

impl From<BindError> for ServiceError {
    fn from(err: BindError) -> Self {
        match err {
            BindError::Unauthorized => ServiceError::Unauthorized,
            BindError::CapabilityDisabled(kind) => {
                ServiceError::CapabilityDisabled(kind.as_str().to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        ServiceError::Validation {
            message: "Invalid input".to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

/// Convert ServiceError to HTTP response
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ServiceError::Validation { message, details } => {
                (StatusCode::BAD_REQUEST, message, details)
            }
            ServiceError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string(), None),
            ServiceError::CapabilityDisabled(_) => {
                (StatusCode::NOT_IMPLEMENTED, self.to_string(), None)
            }
            ServiceError::RateLimitExceeded { message, retry_after } => {
                // Whole seconds, rounded up
                let secs = retry_after.as_millis().div_ceil(1000).max(1);
                let body = ErrorResponse {
                    error: message.to_string(),
                    details: None,
                };
                return (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, secs.to_string())],
                    Json(body),
                )
                    .into_response();
            }
            ServiceError::Config(_) | ServiceError::Internal(_) => {
                tracing::error!(error = %self, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(), // Don't leak details
                    None,
                )
            }
        };

        (status, Json(ErrorResponse { error, details })).into_response()
    }
}

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binding::ProofKind;

    #[test]
    fn test_bind_errors_map_to_distinct_statuses() {
        let unauthorized = ServiceError::from(BindError::Unauthorized).into_response();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let disabled =
            ServiceError::from(BindError::CapabilityDisabled(ProofKind::JwtAssertion)).into_response();
        assert_eq!(disabled.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[test]
    fn test_disabled_message_names_the_kind() {
        let err = ServiceError::from(BindError::CapabilityDisabled(ProofKind::JwtAssertion));
        assert_eq!(err.to_string(), "Not Implemented: jwt_assertion is disabled");
    }

    #[test]
    fn test_rate_limit_sets_retry_after() {
        let response = ServiceError::RateLimitExceeded {
            message: "Too many binding attempts",
            retry_after: std::time::Duration::from_millis(12_300),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "13");
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response = ServiceError::Internal("secret detail".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
