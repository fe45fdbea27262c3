//! Error types for the registration gateway.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Message returned to callers for failures whose detail stays server-side.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Gateway error types.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Username, password, and email are required")]
    MissingFields,

    #[error(
        "Username must be 3-20 characters and contain only letters, numbers, underscores, and hyphens"
    )]
    InvalidUsername,

    #[error("Password must be at least 8 characters long")]
    WeakPassword,

    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Invalid request body")]
    InvalidBody,

    /// The upstream server answered and refused the request.
    #[error("{0}")]
    UpstreamRejected(String),

    /// The upstream call failed below the Subsonic protocol level.
    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Too many registration attempts, please try again later")]
    RateLimitExceeded { retry_after_secs: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// HTTP status reported to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingFields
            | GatewayError::InvalidUsername
            | GatewayError::WeakPassword
            | GatewayError::InvalidEmail
            | GatewayError::InvalidBody
            | GatewayError::UpstreamRejected(_) => StatusCode::BAD_REQUEST,
            GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::Upstream(_) | GatewayError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = if status.is_server_error() {
            error!(error = %self, "Registration failed");
            INTERNAL_ERROR_MESSAGE.to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            success: false,
            error: message,
        };

        let mut response = (status, Json(body)).into_response();
        if let GatewayError::RateLimitExceeded { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the user's password and the admin token
        GatewayError::Upstream(e.without_url().to_string())
    }
}
