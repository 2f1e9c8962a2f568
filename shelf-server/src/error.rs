//! API error handling module
//!
//! Provides a unified error type for all API endpoints with structured error variants.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shelf_core::{CatalogError, LookupError, RecomputeError, StoreError};
use thiserror::Error;

/// API error type with structured variants for different error categories
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad request - client provided invalid input
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error - unexpected server-side failure
    #[error("Internal error: {0}")]
    Internal(String),

    /// Catalog error - error from the core library
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl ApiError {
    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    /// Create an internal server error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Catalog(e) => match e {
                CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
                CatalogError::Store(e) => store_status(e),

                CatalogError::Recompute(RecomputeError::AlreadyRunning) => StatusCode::CONFLICT,
                CatalogError::Recompute(RecomputeError::TimedOut(_)) => {
                    StatusCode::SERVICE_UNAVAILABLE
                }
                CatalogError::Recompute(RecomputeError::Failed { source, .. }) => {
                    if matches!(source, StoreError::Connection(_)) {
                        StatusCode::SERVICE_UNAVAILABLE
                    } else {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                }

                CatalogError::Lookup(LookupError::NotFound(_)) => StatusCode::NOT_FOUND,
                // External service failures → 503
                CatalogError::Lookup(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Get the error code for programmatic error handling
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "INVALID_INPUT",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Catalog(e) => match e {
                CatalogError::Validation(_) => "VALIDATION_FAILED",
                CatalogError::Store(StoreError::NotFound(_)) => "BOOK_NOT_FOUND",
                CatalogError::Store(StoreError::Conflict(_)) => "DUPLICATE_ISBN",
                CatalogError::Store(StoreError::Connection(_)) => "STORE_UNAVAILABLE",
                CatalogError::Store(_) => "STORE_ERROR",
                CatalogError::Recompute(RecomputeError::AlreadyRunning) => "RECOMPUTE_RUNNING",
                CatalogError::Recompute(RecomputeError::TimedOut(_)) => "RECOMPUTE_TIMEOUT",
                CatalogError::Recompute(RecomputeError::Failed { .. }) => "RECOMPUTE_FAILED",
                CatalogError::Lookup(LookupError::NotFound(_)) => "ISBN_NOT_FOUND",
                CatalogError::Lookup(_) => "UPSTREAM_ERROR",
            },
        }
    }

    /// Get sanitized error message for client response
    fn client_message(&self) -> String {
        match self {
            Self::Catalog(CatalogError::Validation(e)) => e.message.clone(),
            Self::Catalog(CatalogError::Store(StoreError::Connection(_))) => {
                "Storage unavailable".to_string()
            }
            Self::Catalog(CatalogError::Store(StoreError::Query(_)))
            | Self::Catalog(CatalogError::Store(StoreError::Migration(_)))
            | Self::Catalog(CatalogError::Store(StoreError::Injected(_))) => {
                "Storage error".to_string()
            }
            Self::Catalog(CatalogError::Recompute(RecomputeError::Failed { phase, .. })) => {
                format!("Similarity recompute failed during {phase}")
            }
            Self::Catalog(CatalogError::Lookup(LookupError::Service(_)))
            | Self::Catalog(CatalogError::Lookup(LookupError::Http(_))) => {
                "Metadata service unavailable".to_string()
            }
            // For other errors, use the Display message
            _ => self.to_string(),
        }
    }

    /// Field that failed validation, when there is one
    fn field(&self) -> Option<&'static str> {
        match self {
            Self::Catalog(CatalogError::Validation(e)) => Some(e.field),
            _ => None,
        }
    }

    /// Get the error category for logging
    fn error_category(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
            Self::Catalog(CatalogError::Validation(_)) => "validation",
            Self::Catalog(CatalogError::Store(_)) => "store",
            Self::Catalog(CatalogError::Recompute(_)) => "recompute",
            Self::Catalog(CatalogError::Lookup(_)) => "lookup",
        }
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Conflict(_) => StatusCode::CONFLICT,
        StoreError::Connection(_) => StatusCode::SERVICE_UNAVAILABLE,
        StoreError::Query(_) | StoreError::Migration(_) | StoreError::Injected(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let category = self.error_category();
        let code = self.error_code();
        let internal_message = self.to_string();
        let client_message = self.client_message();

        // Log based on severity, always including internal details
        if status.is_server_error() {
            tracing::error!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Server error"
            );
        } else {
            tracing::warn!(
                status = %status,
                category = category,
                code = code,
                error = %internal_message,
                "Client error"
            );
        }

        let mut body = serde_json::json!({
            "error": client_message,
            "code": code,
        });
        if let Some(field) = self.field() {
            body["field"] = serde_json::Value::from(field);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        Self::Catalog(e.into())
    }
}

impl From<RecomputeError> for ApiError {
    fn from(e: RecomputeError) -> Self {
        Self::Catalog(e.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelf_core::{RecomputePhase, ValidationError};

    #[test]
    fn test_validation_maps_to_400_with_field() {
        let err = ApiError::from(CatalogError::from(ValidationError::new(
            "published_on",
            "expected YYYY-MM-DD or DD/MM/YYYY",
        )));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
        assert_eq!(err.field(), Some("published_on"));
    }

    #[test]
    fn test_store_errors() {
        assert_eq!(
            ApiError::from(StoreError::NotFound(3)).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Conflict("dup".into())).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(StoreError::Connection("refused".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_recompute_errors() {
        let running = ApiError::from(RecomputeError::AlreadyRunning);
        assert_eq!(running.status_code(), StatusCode::CONFLICT);
        assert_eq!(running.error_code(), "RECOMPUTE_RUNNING");

        let failed = ApiError::from(RecomputeError::Failed {
            phase: RecomputePhase::EdgeWrite,
            source: StoreError::Injected("boom".into()),
        });
        assert_eq!(failed.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            failed.client_message(),
            "Similarity recompute failed during edge write"
        );
    }

    #[test]
    fn test_handler_errors() {
        let bad = ApiError::bad_request("Unsupported sort 'year'");
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(bad.error_code(), "INVALID_INPUT");

        let internal = ApiError::internal("Recompute task failed: panicked");
        assert_eq!(internal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(internal.error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = ApiError::from(StoreError::Query("syntax error at or near".into()));
        assert_eq!(err.client_message(), "Storage error");
    }
}
