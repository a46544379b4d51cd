// libs/auth-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;

use crate::models::{AuthError, LoginRequest, RefreshRequest, RegisterRequest};
use crate::services::identity::IdentityService;

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    debug!("Registration attempt for username: {}", request.username);

    let identity_service = IdentityService::new(&state);

    let (user, tokens) = identity_service
        .register(request)
        .await
        .map_err(|e| match e {
            AuthError::DuplicateField(field) => {
                AppError::BadRequest(format!("{} is already taken", field))
            }
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "user": user,
            "access_token": tokens.access_token,
            "refresh_token": tokens.refresh_token,
            "expires_in": tokens.expires_in
        })),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let identity_service = IdentityService::new(&state);

    let (user, tokens) = identity_service.login(request).await.map_err(|e| match e {
        AuthError::InvalidCredentials => {
            AppError::Auth("Invalid username or password".to_string())
        }
        _ => AppError::Database(e.to_string()),
    })?;

    Ok(Json(json!({
        "user": user,
        "access_token": tokens.access_token,
        "refresh_token": tokens.refresh_token,
        "expires_in": tokens.expires_in
    })))
}

#[axum::debug_handler]
pub async fn refresh(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Value>, AppError> {
    let identity_service = IdentityService::new(&state);

    let token = identity_service
        .refresh(&request.refresh_token)
        .map_err(|e| match e {
            AuthError::InvalidRefreshToken => {
                AppError::Auth("Invalid refresh token".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!(token)))
}

#[axum::debug_handler]
pub async fn get_current_user(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let identity_service = IdentityService::new(&state);

    let profile = identity_service
        .get_user(user.id)
        .await
        .map_err(|e| match e {
            AuthError::UserNotFound => AppError::NotFound("User not found".to_string()),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!(profile)))
}
