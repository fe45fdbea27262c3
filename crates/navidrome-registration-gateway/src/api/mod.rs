//! HTTP API for the registration gateway.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::{logging_middleware, rate_limit_middleware, RateLimitState, UNKNOWN_CLIENT};
pub use types::*;

use crate::subsonic::SubsonicClient;
use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Navidrome admin client
    pub subsonic_client: Arc<SubsonicClient>,
}

impl AppState {
    /// Create new application state.
    pub fn new(subsonic_client: SubsonicClient) -> Self {
        Self {
            subsonic_client: Arc::new(subsonic_client),
        }
    }
}

/// Build the CORS policy for the front-end origin, or any origin for "*".
pub fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE]);

    if allowed_origin == "*" {
        return layer.allow_origin(AllowOrigin::any());
    }

    match HeaderValue::from_str(allowed_origin.trim_end_matches('/')) {
        Ok(origin) => layer
            .allow_origin(AllowOrigin::exact(origin))
            .allow_credentials(true),
        Err(e) => {
            warn!(
                origin = %allowed_origin,
                error = %e,
                "Invalid CORS origin, cross-origin requests disabled"
            );
            layer.allow_origin(AllowOrigin::list(Vec::<HeaderValue>::new()))
        }
    }
}

/// Create the API router.
///
/// Only registration is rate limited; health checks are always answered.
pub fn create_router(state: AppState, rate_limit: RateLimitState, cors: CorsLayer) -> Router {
    let registration = Router::new()
        .route("/api/register", post(handlers::register))
        .route_layer(axum_middleware::from_fn_with_state(
            rate_limit,
            rate_limit_middleware,
        ));

    Router::new()
        .route("/api/health", get(handlers::health))
        .merge(registration)
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
