//! Network-boundary tests: the refresh and CSRF flows exercised through the
//! public API against a mock backend.

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webguard::{GuardError, SecurityConfig, SecurityGuard, TokenBundle};

fn jwt_with_exp(exp: i64) -> String {
    #[derive(Serialize)]
    struct Claims {
        sub: String,
        exp: i64,
    }
    encode(
        &Header::default(),
        &Claims {
            sub: "user-1".to_string(),
            exp,
        },
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}

fn seed_bundle(guard: &SecurityGuard, access_token: &str) {
    guard
        .set_token(&TokenBundle {
            access_token: access_token.to_string(),
            refresh_token: "refresh-old".to_string(),
            expires_at: Utc::now().timestamp_millis() + 3_600_000,
        })
        .unwrap();
}

#[tokio::test]
async fn refresh_posts_the_stored_refresh_token() {
    let server = MockServer::start().await;
    let fresh_token = jwt_with_exp(Utc::now().timestamp() + 3600);

    // The endpoint only answers when the request body carries the stored
    // refresh token under its wire name
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .and(body_partial_json(json!({ "refreshToken": "refresh-old" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "accessToken": fresh_token,
            "refreshToken": "refresh-new",
            "expiresAt": Utc::now().timestamp_millis() + 3_600_000,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let guard =
        SecurityGuard::new(SecurityConfig::default().with_base_url(server.uri())).unwrap();
    seed_bundle(&guard, "stale-access");

    assert!(guard.refresh_token().await);
    assert_eq!(guard.get_token(), Some(fresh_token.clone()));
    assert!(guard.is_token_valid(&fresh_token));
}

#[tokio::test]
async fn refresh_with_malformed_body_keeps_existing_bundle() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let guard =
        SecurityGuard::new(SecurityConfig::default().with_base_url(server.uri())).unwrap();
    seed_bundle(&guard, "access-1");

    assert!(!guard.refresh_token().await);
    assert_eq!(guard.get_token(), Some("access-1".to_string()));
}

#[tokio::test]
async fn csrf_token_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "token": "csrf-123" })))
        .mount(&server)
        .await;

    let guard =
        SecurityGuard::new(SecurityConfig::default().with_base_url(server.uri())).unwrap();
    assert_eq!(guard.csrf_token().await.unwrap(), "csrf-123");
}

#[tokio::test]
async fn csrf_server_error_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let guard =
        SecurityGuard::new(SecurityConfig::default().with_base_url(server.uri())).unwrap();
    let err = guard.csrf_token().await.unwrap_err();
    assert!(matches!(err, GuardError::Http(_)));
}

#[tokio::test]
async fn csrf_malformed_body_propagates() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/auth/csrf"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let guard =
        SecurityGuard::new(SecurityConfig::default().with_base_url(server.uri())).unwrap();
    assert!(guard.csrf_token().await.is_err());
}
