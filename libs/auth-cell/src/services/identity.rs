// libs/auth-cell/src/services/identity.rs
use chrono::Duration;
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::auth::{Role, TokenPair, TokenUse};
use shared_utils::jwt::{issue_token, validate_token};

use crate::models::{AccessToken, AuthError, LoginRequest, RegisterRequest, User, UserProfile};
use crate::services::password::{hash_password, verify_password};

const MIN_USERNAME_LENGTH: usize = 3;
const MIN_PASSWORD_LENGTH: usize = 8;

/// Account registration, credential checks and token issuance.
pub struct IdentityService {
    supabase: SupabaseClient,
    jwt_secret: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl IdentityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            jwt_secret: config.supabase_jwt_secret.clone(),
            access_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_ttl: Duration::days(config.refresh_token_ttl_days),
        }
    }

    /// Create an account and sign the new user in.
    pub async fn register(
        &self,
        request: RegisterRequest,
    ) -> Result<(UserProfile, TokenPair), AuthError> {
        validate_registration(&request)?;

        let username = request.username.trim();
        let email = request.email.trim();

        // Friendly pre-check; the unique constraints on the table settle races.
        let path = format!(
            "/rest/v1/users?or=(username.eq.{},email.eq.{})&select=username,email",
            urlencoding::encode(username),
            urlencoding::encode(email)
        );
        let existing: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        if let Some(row) = existing.first() {
            let field = if row["username"].as_str() == Some(username) {
                "username"
            } else {
                "email"
            };
            return Err(AuthError::DuplicateField(field.to_string()));
        }

        let password_hash = hash_password(&request.password).map_err(AuthError::Internal)?;

        let user_data = json!({
            "username": username,
            "email": email,
            "full_name": request.full_name.trim(),
            "role": request.role,
            "specialization": request.specialization,
            "license_number": request.license_number,
            "phone": request.phone,
            "password_hash": password_hash
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/users",
                Some(user_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(msg) => {
                    let field = if msg.contains("username") {
                        "username"
                    } else {
                        "email"
                    };
                    AuthError::DuplicateField(field.to_string())
                }
                other => AuthError::DatabaseError(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(AuthError::DatabaseError(
                "Failed to create user".to_string(),
            ));
        }

        let user: User = serde_json::from_value(result[0].clone())
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        info!("User {} registered as {}", user.id, user.role);

        let tokens = self.issue_pair(user.id, user.role)?;
        Ok((UserProfile::from(user), tokens))
    }

    /// Check credentials and issue a token pair. Unknown usernames and
    /// wrong passwords produce the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<(UserProfile, TokenPair), AuthError> {
        let username = request.username.trim();
        debug!("Login attempt for username: {}", username);

        let path = format!(
            "/rest/v1/users?username=eq.{}",
            urlencoding::encode(username)
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            warn!("Login failed: unknown username");
            return Err(AuthError::InvalidCredentials);
        }

        let user: User = serde_json::from_value(result[0].clone())
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        let matches =
            verify_password(&request.password, &user.password_hash).map_err(AuthError::Internal)?;
        if !matches {
            warn!("Login failed: wrong password for user {}", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        info!("User {} logged in", user.id);

        let tokens = self.issue_pair(user.id, user.role)?;
        Ok((UserProfile::from(user), tokens))
    }

    /// Exchange a refresh token for a fresh access token. Access tokens are
    /// rejected here; only refresh-use tokens mint new credentials.
    pub fn refresh(&self, refresh_token: &str) -> Result<AccessToken, AuthError> {
        let user = validate_token(refresh_token, &self.jwt_secret, TokenUse::Refresh)
            .map_err(|_| AuthError::InvalidRefreshToken)?;

        debug!("Refreshing access token for user {}", user.id);

        let access_token = issue_token(
            user.id,
            user.role,
            TokenUse::Access,
            self.access_ttl,
            &self.jwt_secret,
        )
        .map_err(AuthError::Internal)?;

        Ok(AccessToken {
            access_token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }

    /// The authenticated caller's own profile.
    pub async fn get_user(&self, user_id: Uuid) -> Result<UserProfile, AuthError> {
        debug!("Fetching profile for user: {}", user_id);

        let path = format!("/rest/v1/users?id=eq.{}", user_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AuthError::UserNotFound);
        }

        let user: User = serde_json::from_value(result[0].clone())
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?;

        Ok(UserProfile::from(user))
    }

    fn issue_pair(&self, user_id: Uuid, role: Role) -> Result<TokenPair, AuthError> {
        let access_token = issue_token(
            user_id,
            role,
            TokenUse::Access,
            self.access_ttl,
            &self.jwt_secret,
        )
        .map_err(AuthError::Internal)?;

        let refresh_token = issue_token(
            user_id,
            role,
            TokenUse::Refresh,
            self.refresh_ttl,
            &self.jwt_secret,
        )
        .map_err(AuthError::Internal)?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            expires_in: self.access_ttl.num_seconds(),
        })
    }
}

fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
    if request.username.trim().len() < MIN_USERNAME_LENGTH {
        return Err(AuthError::ValidationError(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LENGTH
        )));
    }

    if !is_valid_email(request.email.trim()) {
        return Err(AuthError::ValidationError(
            "Invalid email address".to_string(),
        ));
    }

    if request.password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }

    if request.full_name.trim().is_empty() {
        return Err(AuthError::ValidationError(
            "Full name must not be empty".to_string(),
        ));
    }

    Ok(())
}

fn is_valid_email(email: &str) -> bool {
    let email_regex = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    email_regex.is_match(email)
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
