//! Error handling for the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use uuid::Uuid;

/// Application error types that map to HTTP responses
#[derive(Error, Debug)]
pub enum AppError {
    #[error("validation error: {message}")]
    Validation {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("bad request: {message}")]
    BadRequest { message: String, code: String },

    #[error("bad gateway: {message}")]
    BadGateway {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("gateway timeout: {message}")]
    GatewayTimeout {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error("configuration error: {message}")]
    Misconfigured {
        details: Vec<serde_json::Value>,
        code: String,
        message: String,
    },

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Create a validation error
    pub fn validation(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Validation {
            details,
            code: "validation_error".to_string(),
            message: message.into(),
        }
    }

    /// Create a bad request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
            code: "bad_request".to_string(),
        }
    }

    /// An upstream service failed or refused the request
    pub fn bad_gateway(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::BadGateway {
            details,
            code: "upstream_error".to_string(),
            message: message.into(),
        }
    }

    /// An upstream service did not answer in time
    pub fn gateway_timeout(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::GatewayTimeout {
            details,
            code: "upstream_timeout".to_string(),
            message: message.into(),
        }
    }

    /// The server is missing configuration it needs to serve the request
    pub fn misconfigured(details: Vec<serde_json::Value>, message: impl Into<String>) -> Self {
        Self::Misconfigured {
            details,
            code: "configuration_error".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let timestamp = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();

        let (status, error_code, message, details) = match self {
            AppError::Validation {
                details,
                code,
                message,
            } => (StatusCode::UNPROCESSABLE_ENTITY, code, message, details),
            AppError::BadRequest { message, code } => {
                (StatusCode::BAD_REQUEST, code, message, Vec::new())
            }
            AppError::BadGateway {
                details,
                code,
                message,
            } => (StatusCode::BAD_GATEWAY, code, message, details),
            AppError::GatewayTimeout {
                details,
                code,
                message,
            } => (StatusCode::GATEWAY_TIMEOUT, code, message, details),
            AppError::Misconfigured {
                details,
                code,
                message,
            } => (StatusCode::INTERNAL_SERVER_ERROR, code, message, details),
            AppError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error".to_string(),
                e.to_string(),
                Vec::new(),
            ),
        };

        tracing::error!(
            error_id = %error_id,
            error_code = %error_code,
            status_code = %status.as_u16(),
            message = %message,
            "Request error"
        );

        // In production, we might want to hide internal error details
        let message = if cfg!(not(debug_assertions)) && error_code == "internal_error" {
            "An internal server error occurred".to_string()
        } else {
            message
        };

        let error_response = json!({
            "error": {
                "code": error_code,
                "message": message,
                "details": details,
                "trace_id": error_id.to_string(),
                "timestamp": timestamp
            }
        });

        (status, Json(error_response)).into_response()
    }
}
