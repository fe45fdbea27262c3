//! Navidrome client for Subsonic user administration.

use super::auth::UpstreamCredential;
use super::types::{
    AuthParams, CreateUserParams, Envelope, API_VERSION, CLIENT_NAME, SELF_REGISTERED_ROLES,
};
use crate::error::GatewayError;
use crate::validation::Registration;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Fallback when Navidrome refuses a user without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Failed to create user";

/// Subsonic API client authenticated as a Navidrome admin.
pub struct SubsonicClient {
    client: Client,
    base_url: String,
    admin_user: String,
    admin_password: SecretString,
}

impl SubsonicClient {
    /// Create a new Subsonic client.
    ///
    /// Without a `timeout` the client waits on the server indefinitely.
    pub fn new(
        base_url: impl Into<String>,
        admin_user: impl Into<String>,
        admin_password: SecretString,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            admin_user: admin_user.into(),
            admin_password,
        })
    }

    /// Base URL of the Navidrome server.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Create a Navidrome account with the fixed self-registration roles.
    #[instrument(skip(self, registration), fields(username = %registration.username))]
    pub async fn create_user(&self, registration: &Registration) -> Result<(), GatewayError> {
        let credential = UpstreamCredential::generate(&self.admin_password);
        let url = format!("{}/rest/createUser", self.base_url);

        debug!(url = %url, "Sending createUser request");

        let response = self
            .client
            .get(&url)
            .query(&AuthParams {
                u: &self.admin_user,
                t: &credential.token,
                s: &credential.salt,
                v: API_VERSION,
                c: CLIENT_NAME,
                f: "json",
            })
            .query(&CreateUserParams {
                username: &registration.username,
                password: registration.password.expose_secret(),
                email: &registration.email,
            })
            .query(&SELF_REGISTERED_ROLES)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        interpret_response(status, &body)?;

        debug!("User created");
        Ok(())
    }
}

/// Map a `createUser` reply onto the gateway's error taxonomy.
///
/// Subsonic reports most failures with HTTP 200 and `status: "failed"`, so
/// the body decides. A non-2xx reply only counts as a refusal when it still
/// carries a Subsonic error message.
pub fn interpret_response(status: StatusCode, body: &str) -> Result<(), GatewayError> {
    let envelope = serde_json::from_str::<Envelope>(body).ok();

    if status.is_success() {
        return match envelope {
            Some(envelope) if envelope.response.is_ok() => Ok(()),
            Some(envelope) => {
                let message = envelope
                    .response
                    .error_message()
                    .unwrap_or(DEFAULT_FAILURE_MESSAGE)
                    .to_string();
                warn!(message = %message, "Navidrome refused createUser");
                Err(GatewayError::UpstreamRejected(message))
            }
            None => Err(GatewayError::Upstream(format!(
                "Malformed createUser response: {}",
                body
            ))),
        };
    }

    match envelope.as_ref().and_then(|e| e.response.error_message()) {
        Some(message) => {
            warn!(status = %status, message = %message, "Navidrome refused createUser");
            Err(GatewayError::UpstreamRejected(message.to_string()))
        }
        None => Err(GatewayError::Upstream(format!(
            "createUser failed: {} - {}",
            status, body
        ))),
    }
}
