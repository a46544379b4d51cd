use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{extract::State, Json};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use auth_cell::handlers;
use auth_cell::models::{LoginRequest, RefreshRequest, RegisterRequest};
use auth_cell::services::password::hash_password;
use shared_models::auth::{Role, TokenUse};
use shared_models::error::AppError;
use shared_utils::jwt::validate_token;
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn register_request() -> RegisterRequest {
    RegisterRequest {
        username: "alice".to_string(),
        email: "alice@example.com".to_string(),
        password: "a fine long password".to_string(),
        full_name: "Alice Cooper".to_string(),
        role: Role::Patient,
        specialization: None,
        license_number: None,
        phone: None,
    }
}

#[tokio::test]
async fn test_register_rejects_short_password() {
    let config = TestConfig::default().to_arc();

    let mut request = register_request();
    request.password = "short".to_string();

    // Validation fails before any request leaves the process
    let result = handlers::register(State(Arc::clone(&config)), Json(request)).await;

    match result.unwrap_err() {
        AppError::ValidationError(msg) => assert!(msg.contains("at least 8")),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_register_rejects_invalid_email() {
    let config = TestConfig::default().to_arc();

    let mut request = register_request();
    request.email = "not-an-email".to_string();

    let result = handlers::register(State(Arc::clone(&config)), Json(request)).await;

    match result.unwrap_err() {
        AppError::ValidationError(msg) => assert!(msg.contains("email")),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_issues_verifiable_access_token() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::patient("alice");
    let refresh_token = JwtTestUtils::create_refresh_token(&user, &config.supabase_jwt_secret);

    let result = handlers::refresh(
        State(Arc::clone(&config)),
        Json(RefreshRequest { refresh_token }),
    )
    .await;

    let Json(body) = result.unwrap();
    assert_eq!(body["expires_in"], 3600);

    // The minted token must pass access-token validation for the same user
    let access_token = body["access_token"].as_str().unwrap();
    let validated = validate_token(access_token, &config.supabase_jwt_secret, TokenUse::Access)
        .unwrap();
    assert_eq!(validated.id, user.id);
    assert_eq!(validated.role, Role::Patient);
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let config = TestConfig::default().to_arc();
    let user = TestUser::patient("alice");
    let access_token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));

    let result = handlers::refresh(
        State(Arc::clone(&config)),
        Json(RefreshRequest {
            refresh_token: access_token,
        }),
    )
    .await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Invalid refresh token"),
        other => panic!("Expected auth error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_refresh_rejects_malformed_token() {
    let config = TestConfig::default().to_arc();

    let result = handlers::refresh(
        State(Arc::clone(&config)),
        Json(RefreshRequest {
            refresh_token: JwtTestUtils::create_malformed_token(),
        }),
    )
    .await;

    assert_matches!(result.unwrap_err(), AppError::Auth(_));
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    let user = TestUser::patient("alice");
    let stored_hash = hash_password("the actual password").unwrap();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("username", "eq.alice"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::user_row_with_hash(user.id, "alice", "patient", &stored_hash),
        ])))
        .mount(&mock_server)
        .await;

    let result = handlers::login(
        State(Arc::clone(&config)),
        Json(LoginRequest {
            username: "alice".to_string(),
            password: "a wrong guess".to_string(),
        }),
    )
    .await;

    match result.unwrap_err() {
        AppError::Auth(msg) => assert_eq!(msg, "Invalid username or password"),
        other => panic!("Expected auth error, got {:?}", other),
    }
}
