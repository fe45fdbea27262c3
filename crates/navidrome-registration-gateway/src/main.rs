//! Navidrome Registration Gateway - Entry point.

use navidrome_registration_gateway::{
    api::{cors_layer, create_router, AppState, RateLimitState},
    config::{Config, LogFormat},
    subsonic::SubsonicClient,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let registry = tracing_subscriber::registry().with(filter);
    match config.log.format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    info!("Starting Navidrome Registration Gateway");

    let Config {
        navidrome,
        server,
        cors,
        rate_limit,
        ..
    } = config;

    // Initialize Navidrome client
    let subsonic_client = match SubsonicClient::new(
        navidrome.url,
        navidrome.admin_user,
        navidrome.admin_password,
        navidrome.timeout,
    ) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to create Navidrome client: {}", e);
            std::process::exit(1);
        }
    };

    info!(upstream = %subsonic_client.base_url(), "Navidrome client ready");

    let state = AppState::new(subsonic_client);
    let rate_limit = RateLimitState::from_config(&rate_limit);
    let app = create_router(state, rate_limit, cors_layer(&cors.allowed_origin));

    // Bind to address
    let ip = match server.listen_addr.parse() {
        Ok(ip) => ip,
        Err(e) => {
            error!("Invalid listen address {}: {}", server.listen_addr, e);
            std::process::exit(1);
        }
    };
    let addr = SocketAddr::new(ip, server.port);

    info!("Listening on {}", addr);

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    // Peer addresses key the rate limiter
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
