//! Integration tests for the registration gateway API.

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, Method, Request, StatusCode},
    Router,
};
use navidrome_registration_gateway::{
    api::{cors_layer, create_router, AppState, RateLimitState},
    subsonic::{UpstreamCredential, API_VERSION, CLIENT_NAME, DEFAULT_FAILURE_MESSAGE},
    SubsonicClient,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ADMIN_USER: &str = "admin";
const ADMIN_PASSWORD: &str = "admin-secret";

fn admin_password() -> SecretString {
    SecretString::new(ADMIN_PASSWORD.to_string())
}

/// Create a test app pointed at `upstream_url`.
fn create_test_app(upstream_url: &str, rate_limit: RateLimitState) -> Router {
    let client = SubsonicClient::new(upstream_url, ADMIN_USER, admin_password(), None).unwrap();
    create_router(AppState::new(client), rate_limit, cors_layer("*"))
}

fn register_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri("/api/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn valid_body(username: &str) -> Value {
    json!({
        "username": username,
        "password": "listen-to-this",
        "email": format!("{}@example.com", username),
    })
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    (status, json)
}

async fn mount_create_user(server: &MockServer, response: Value, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path("/rest/createUser"))
        .respond_with(ResponseTemplate::new(200).set_body_json(response))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn ok_response() -> Value {
    json!({"subsonic-response": {"status": "ok", "version": "1.16.1"}})
}

fn query_of(request: &wiremock::Request) -> HashMap<String, String> {
    request.url.query_pairs().into_owned().collect()
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = MockServer::start().await;
    let app = create_test_app(&server.uri(), RateLimitState::permissive());

    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, json) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["upstreamUrl"], server.uri());
    assert!(json["message"].is_string());

    // Health reports configuration only
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_register_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/createUser"))
        .and(query_param("username", "alice"))
        .and(query_param("u", ADMIN_USER))
        .and(query_param("f", "json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ok_response()))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["username"], "alice");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn test_create_user_query_parameters() {
    let server = MockServer::start().await;
    mount_create_user(&server, ok_response(), 1).await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let body = json!({
        "username": "Bob_the-2nd",
        "password": "p@ss word&more",
        "email": "bob+music@example.org",
    });
    let (status, _) = send(&app, register_request(&body)).await;
    assert_eq!(status, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    let query = query_of(&requests[0]);

    // User fields pass through unchanged
    assert_eq!(query["username"], "Bob_the-2nd");
    assert_eq!(query["password"], "p@ss word&more");
    assert_eq!(query["email"], "bob+music@example.org");

    // Token auth, never the admin password itself
    assert_eq!(query["u"], ADMIN_USER);
    assert_eq!(query["v"], API_VERSION);
    assert_eq!(query["c"], CLIENT_NAME);
    assert_eq!(query["f"], "json");
    assert!(!query.values().any(|v| v == ADMIN_PASSWORD));
    let expected = UpstreamCredential::with_salt(&admin_password(), query["s"].clone());
    assert_eq!(query["t"], expected.token);

    // Fixed roles
    for role in [
        "streamRole",
        "downloadRole",
        "uploadRole",
        "playlistRole",
        "coverArtRole",
        "commentRole",
        "podcastRole",
        "shareRole",
    ] {
        assert_eq!(query[role], "true", "{} should be granted", role);
    }
    for role in ["adminRole", "settingsRole", "jukeboxRole"] {
        assert_eq!(query[role], "false", "{} should be denied", role);
    }
}

#[tokio::test]
async fn test_register_duplicate_username() {
    let server = MockServer::start().await;
    mount_create_user(
        &server,
        json!({"subsonic-response": {
            "status": "failed",
            "error": {"code": 0, "message": "Username already exists"}
        }}),
        1,
    )
    .await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Username already exists");
}

#[tokio::test]
async fn test_register_upstream_failure_without_message() {
    let server = MockServer::start().await;
    mount_create_user(&server, json!({"subsonic-response": {"status": "failed"}}), 1).await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], DEFAULT_FAILURE_MESSAGE);
}

#[tokio::test]
async fn test_register_http_error_with_subsonic_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/createUser"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "subsonic-response": {
                "status": "failed",
                "error": {"code": 50, "message": "User is not authorized for the given operation."}
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "User is not authorized for the given operation.");
}

#[tokio::test]
async fn test_register_upstream_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/createUser"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .expect(1)
        .mount(&server)
        .await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());
    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Internal server error");
}

#[tokio::test]
async fn test_register_connection_refused() {
    // Reserve a port, then free it so nothing is listening
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let upstream_url = format!("http://127.0.0.1:{}", port);
    let app = create_test_app(&upstream_url, RateLimitState::permissive());

    let (status, json) = send(&app, register_request(&valid_body("alice"))).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "Internal server error");
    assert!(!json.to_string().contains("127.0.0.1"));
}

#[tokio::test]
async fn test_validation_errors_never_reach_upstream() {
    let server = MockServer::start().await;
    mount_create_user(&server, ok_response(), 0).await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());

    let cases = [
        (
            json!({"username": "alice", "password": "listen-to-this"}),
            "Username, password, and email are required",
        ),
        (
            json!({"username": "", "password": "listen-to-this", "email": "a@b.co"}),
            "Username, password, and email are required",
        ),
        (
            json!({"username": "al", "password": "listen-to-this", "email": "a@b.co"}),
            "Username must be 3-20 characters and contain only letters, numbers, underscores, and hyphens",
        ),
        (
            json!({"username": "al ice", "password": "listen-to-this", "email": "a@b.co"}),
            "Username must be 3-20 characters and contain only letters, numbers, underscores, and hyphens",
        ),
        (
            json!({"username": "a_very_long_username_x", "password": "listen-to-this", "email": "a@b.co"}),
            "Username must be 3-20 characters and contain only letters, numbers, underscores, and hyphens",
        ),
        (
            json!({"username": "alice", "password": "1234567", "email": "a@b.co"}),
            "Password must be at least 8 characters long",
        ),
        (
            json!({"username": "alice", "password": "listen-to-this", "email": "alice@localhost"}),
            "Invalid email address",
        ),
        (
            json!({"username": "alice", "password": "listen-to-this", "email": "alice example.com"}),
            "Invalid email address",
        ),
    ];

    for (body, expected) in cases {
        let (status, json) = send(&app, register_request(&body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], expected, "body: {}", body);
    }
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;
    mount_create_user(&server, ok_response(), 0).await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);

    // No JSON content type means no fields
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/register")
        .body(Body::from("username=alice"))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Username, password, and email are required");
}

#[tokio::test]
async fn test_rate_limiting() {
    let server = MockServer::start().await;
    // Five attempts from the first client plus one from the second
    mount_create_user(&server, ok_response(), 6).await;

    let app = create_test_app(
        &server.uri(),
        RateLimitState::new(5, std::time::Duration::from_secs(15 * 60)),
    );

    let from = |addr: &str, body: &Value| {
        let mut request = register_request(body);
        let addr: SocketAddr = addr.parse().unwrap();
        request.extensions_mut().insert(ConnectInfo(addr));
        request
    };

    for i in 0..5 {
        let body = valid_body(&format!("user{}", i));
        let (status, _) = send(&app, from("203.0.113.7:40000", &body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Sixth attempt is refused whatever the payload
    let response = app
        .clone()
        .oneshot(from("203.0.113.7:40001", &valid_body("user5")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key(header::RETRY_AFTER));

    let (status, json) = send(&app, from("203.0.113.7:40002", &json!({}))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(json["success"], false);
    assert_eq!(
        json["error"],
        "Too many registration attempts, please try again later"
    );

    // Health is not limited
    let request = Request::builder()
        .uri("/api/health")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);

    // Other clients have their own allowance
    let (status, _) = send(&app, from("198.51.100.2:40000", &valid_body("carol"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_rate_limit_holds_for_whole_window() {
    let server = MockServer::start().await;
    // Five attempts in the first window, one in the next
    mount_create_user(&server, ok_response(), 6).await;

    let app = create_test_app(
        &server.uri(),
        RateLimitState::new(5, std::time::Duration::from_secs(1)),
    );

    for i in 0..5 {
        let (status, _) = send(&app, register_request(&valid_body(&format!("user{}", i)))).await;
        assert_eq!(status, StatusCode::OK);
    }

    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    let (status, _) = send(&app, register_request(&valid_body("user5"))).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    tokio::time::sleep(std::time::Duration::from_millis(900)).await;
    let (status, _) = send(&app, register_request(&valid_body("user6"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_concurrent_registrations_use_fresh_salts() {
    let server = MockServer::start().await;
    mount_create_user(&server, ok_response(), 2).await;

    let app = create_test_app(&server.uri(), RateLimitState::permissive());

    let (first, second) = tokio::join!(
        send(&app, register_request(&valid_body("alice"))),
        send(&app, register_request(&valid_body("bobby"))),
    );
    assert_eq!(first.0, StatusCode::OK);
    assert_eq!(second.0, StatusCode::OK);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);

    let first = query_of(&requests[0]);
    let second = query_of(&requests[1]);
    assert_ne!(first["s"], second["s"]);
    assert_ne!(first["t"], second["t"]);
}

#[tokio::test]
async fn test_cors_preflight_allowed_origin() {
    let server = MockServer::start().await;
    let client = SubsonicClient::new(server.uri(), ADMIN_USER, admin_password(), None).unwrap();
    let app = create_router(
        AppState::new(client),
        RateLimitState::permissive(),
        cors_layer("https://music.example.com"),
    );

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/register")
                .header(header::ORIGIN, "https://music.example.com")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "https://music.example.com"
    );
}
