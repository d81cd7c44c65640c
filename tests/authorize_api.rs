use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use forward_auth::app::build_router;
use forward_auth::services::auth::{AuthorizeServices, JwtVerifyTokenService, TokenAlgorithm, assemble};
use forward_auth::services::authorize::StateSigner;
use forward_auth::services::policy::{ApplicationsFile, AuthorizeProperties};
use forward_auth::state::AppState;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use url::Url;

const SECRET: &str = "integration-test-secret";
const ISSUER: &str = "https://idp.example.com/";
const STATE_KEY: &str = "state-signing-key-0123456789";

const APPLICATIONS: &str = r#"
[default]
name = "default"
client_id = "default-client"
redirect_uri = "https://auth.example.com/signin"
token_cookie_domain = "example.com"

[[application]]
name = "admin.example.com"
client_id = "admin-client"
token_cookie_domain = "admin.example.com"
claims = ["role", "email", "https://example.com/roles"]
required_claims = { role = "admin" }

[[application]]
name = "reports.example.com"
audience = "https://reports.example.com"
required_permissions = ["read:reports"]
"#;

fn services() -> AuthorizeServices {
    let file: ApplicationsFile = toml::from_str(APPLICATIONS).unwrap();
    let properties = AuthorizeProperties::from_file(
        Url::parse("https://idp.example.com/authorize").unwrap(),
        file,
    )
    .unwrap();
    let verifier = JwtVerifyTokenService::new(TokenAlgorithm::Hs256, SECRET, ISSUER, 0).unwrap();

    assemble(
        Arc::new(verifier),
        properties,
        StateSigner::new(STATE_KEY.as_bytes().to_vec()),
    )
}

fn app(services: AuthorizeServices) -> Router {
    build_router(AppState::new(services), Duration::from_secs(5))
}

fn far_future() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        + 3600
}

fn sign(extra: Value) -> String {
    let mut claims = json!({ "iss": ISSUER, "sub": "user-1", "exp": far_future() });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn forwarded(host: &str) -> axum::http::request::Builder {
    Request::builder()
        .uri("/api/v1/authorize")
        .header("x-forwarded-proto", "https")
        .header("x-forwarded-host", host)
        .header("x-forwarded-uri", "/dashboard?tab=1")
        .header("x-forwarded-method", "GET")
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let response = app(services())
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn anonymous_browser_gets_redirect_and_nonce_cookie() {
    let services = services();
    let signer = services.handler.signer().clone();

    let response = app(services)
        .oneshot(forwarded("admin.example.com").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);

    let location = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| Url::parse(v).unwrap())
        .unwrap();
    assert!(location.as_str().starts_with("https://idp.example.com/authorize?"));
    let query: std::collections::HashMap<_, _> = location.query_pairs().into_owned().collect();
    assert_eq!(query["response_type"], "code");
    assert_eq!(query["client_id"], "admin-client");
    assert_eq!(query["redirect_uri"], "https://auth.example.com/signin");

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Secure"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(cookie.contains("Domain=admin.example.com"));

    let nonce = cookie
        .split(';')
        .next()
        .and_then(|pair| pair.strip_prefix("AUTH_NONCE="))
        .unwrap();

    let requested = signer.verify_callback(&query["state"], Some(nonce)).unwrap();
    assert_eq!(requested.to_string(), "https://admin.example.com/dashboard?tab=1");
}

#[tokio::test]
async fn anonymous_api_call_is_denied() {
    let response = app(services())
        .oneshot(
            forwarded("admin.example.com")
                .header(header::ACCEPT, "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["error"]["code"], "ACCESS_DENIED");
}

#[tokio::test]
async fn admin_is_granted_with_userinfo_headers() {
    let access = sign(json!({}));
    let id = sign(json!({
        "role": "admin",
        "email": "admin@example.com",
        "https://example.com/roles": ["admin", "ops"]
    }));

    let response = app(services())
        .oneshot(
            forwarded("admin.example.com")
                .header(header::AUTHORIZATION, format!("Bearer {}", access))
                .header(header::COOKIE, format!("JWT_ID_TOKEN={}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-forwardauth-role"], "admin");
    assert_eq!(response.headers()["x-forwardauth-email"], "admin@example.com");
    assert_eq!(
        response.headers()["x-forwardauth-https---example.com-roles"],
        "admin, ops"
    );
}

#[tokio::test]
async fn lowercase_bearer_scheme_is_api_mode() {
    let access = sign(json!({}));

    let response = app(services())
        .oneshot(
            forwarded("admin.example.com")
                .header(header::AUTHORIZATION, format!("bearer {}", access))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    // id token missing: an API client is denied, never redirected
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn non_admin_is_denied() {
    let access = sign(json!({}));
    let id = sign(json!({ "role": "user" }));

    let response = app(services())
        .oneshot(
            forwarded("admin.example.com")
                .header(header::COOKIE, format!("ACCESS_TOKEN={}; JWT_ID_TOKEN={}", access, id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn permissions_and_audience_come_from_access_token() {
    let id = sign(json!({}));
    let granted = sign(json!({ "aud": "https://reports.example.com", "scope": "openid read:reports" }));
    let wrong_audience = sign(json!({ "aud": "https://other.example.com", "scope": "read:reports" }));

    for (access, expected) in [
        (granted, StatusCode::OK),
        (wrong_audience, StatusCode::TEMPORARY_REDIRECT),
    ] {
        let response = app(services())
            .oneshot(
                forwarded("reports.example.com")
                    .header(header::COOKIE, format!("ACCESS_TOKEN={}; JWT_ID_TOKEN={}", access, id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), expected);
    }
}

#[tokio::test]
async fn expired_session_in_browser_is_redirected() {
    let expired = encode(
        &Header::default(),
        &json!({ "iss": ISSUER, "sub": "user-1", "exp": 1_000 }),
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let response = app(services())
        .oneshot(
            forwarded("unknown.example.org")
                .header(header::COOKIE, format!("ACCESS_TOKEN={}; JWT_ID_TOKEN={}", expired, expired))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.contains("Domain=example.com"));
}

#[tokio::test]
async fn missing_forwarded_header_is_bad_request() {
    let response = app(services())
        .oneshot(
            Request::builder()
                .uri("/api/v1/authorize")
                .header("x-forwarded-proto", "https")
                .header("x-forwarded-host", "admin.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"]["code"], "MISSING_FORWARDED_HEADER");
}

#[tokio::test]
async fn invalid_forwarded_method_is_internal_error() {
    let response = app(services())
        .oneshot(
            Request::builder()
                .uri("/api/v1/authorize")
                .header("x-forwarded-proto", "https")
                .header("x-forwarded-host", "admin.example.com")
                .header("x-forwarded-uri", "/")
                .header("x-forwarded-method", "BREW")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"]["message"], "internal server error");
}

#[tokio::test]
async fn unknown_route_is_permission_denied() {
    let response = app(services())
        .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await["error"]["message"],
        "Permission denied to resource."
    );
}

#[tokio::test]
async fn request_id_is_propagated() {
    let response = app(services())
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-request-id", "abc-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "abc-123");
}
