//! HTTP request handlers.

use super::types::{HealthResponse, RegisterRequest, RegisterResponse};
use super::AppState;
use crate::error::GatewayError;
use crate::validation::Registration;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use tracing::{debug, info};

/// Health check endpoint.
///
/// Reports the configured upstream only; Navidrome itself is not contacted.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: "Navidrome registration gateway is running".to_string(),
        upstream_url: state.subsonic_client.base_url().to_string(),
    })
}

/// Create a Navidrome account for the submitted username, password and email.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, GatewayError> {
    let request = match payload {
        Ok(Json(request)) => request,
        // A body sent without a JSON content type carries no fields
        Err(JsonRejection::MissingJsonContentType(_)) => RegisterRequest::default(),
        Err(rejection) => {
            debug!(rejection = %rejection.body_text(), "Unreadable registration body");
            return Err(GatewayError::InvalidBody);
        }
    };

    let registration = Registration::validate(request.username, request.password, request.email)?;
    info!(username = %registration.username, "Registration request received");

    state.subsonic_client.create_user(&registration).await?;

    info!(username = %registration.username, "User registered");

    Ok(Json(RegisterResponse {
        success: true,
        message: "User created successfully".to_string(),
        username: registration.username,
    }))
}
