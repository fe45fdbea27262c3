//! API request and response types.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

/// Self-registration request.
///
/// Fields are optional so that absent values are reported by validation
/// rather than rejected by the JSON extractor.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub username: Option<String>,
    pub password: Option<SecretString>,
    pub email: Option<String>,
}

/// Response after a successful registration.
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub success: bool,
    pub message: String,
    pub username: String,
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub upstream_url: String,
}
