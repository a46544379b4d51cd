use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_service_key: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_service_key: "test-service-key".to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_service_key: self.supabase_service_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            access_token_ttl_minutes: 60,
            refresh_token_ttl_days: 30,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub username: String,
    pub role: Role,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4(),
            username: "testuser".to_string(),
            role: Role::Patient,
        }
    }
}

impl TestUser {
    pub fn new(username: &str, role: Role) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.to_string(),
            role,
        }
    }

    pub fn doctor(username: &str) -> Self {
        Self::new(username, Role::Doctor)
    }

    pub fn patient(username: &str) -> Self {
        Self::new(username, Role::Patient)
    }

    pub fn to_auth_user(&self) -> AuthUser {
        AuthUser {
            id: self.id,
            role: self.role,
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        Self::sign_token(user, secret, "access", Duration::hours(exp_hours.unwrap_or(24)))
    }

    pub fn create_refresh_token(user: &TestUser, secret: &str) -> String {
        Self::sign_token(user, secret, "refresh", Duration::days(30))
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }

    fn sign_token(user: &TestUser, secret: &str, token_use: &str, ttl: Duration) -> String {
        let now = Utc::now();
        let exp = now + ttl;

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id.to_string(),
            "role": user.role,
            "token_use": token_use,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }
}

pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn user_row(id: Uuid, username: &str, role: &str) -> serde_json::Value {
        json!({
            "id": id,
            "username": username,
            "email": format!("{}@example.com", username),
            "full_name": "Test User",
            "role": role,
            "specialization": null,
            "license_number": null,
            "phone": null,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn user_row_with_hash(
        id: Uuid,
        username: &str,
        role: &str,
        password_hash: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "username": username,
            "email": format!("{}@example.com", username),
            "full_name": "Test User",
            "role": role,
            "specialization": null,
            "license_number": null,
            "phone": null,
            "password_hash": password_hash,
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn doctor_row(id: Uuid, username: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": id,
            "username": username,
            "email": format!("{}@example.com", username),
            "full_name": full_name,
            "specialization": "General Practice",
            "license_number": null
        })
    }

    pub fn dated_window_row(doctor_id: Uuid, date: &str, slots: &[&str]) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "kind": "dated",
            "date": date,
            "time_slots": slots,
            "day_of_week": null,
            "start_time": null,
            "end_time": null,
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn recurring_window_row(
        doctor_id: Uuid,
        day_of_week: u8,
        start_time: &str,
        end_time: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "kind": "recurring",
            "date": null,
            "time_slots": null,
            "day_of_week": day_of_week,
            "start_time": start_time,
            "end_time": end_time,
            "is_available": true,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        id: Uuid,
        doctor_id: Uuid,
        patient_id: Uuid,
        date: &str,
        slot: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": id,
            "doctor_id": doctor_id,
            "patient_id": patient_id,
            "date": date,
            "slot": slot,
            "status": status,
            "appointment_type": "consultation",
            "notes": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn unique_violation_body() -> serde_json::Value {
        json!({
            "code": "23505",
            "details": "Key (doctor_id, date, slot) already exists.",
            "hint": null,
            "message": "duplicate key value violates unique constraint \"appointments_one_scheduled_per_slot\""
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_service_key, "test-service-key");
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("drsmith");
        assert_eq!(user.username, "drsmith");
        assert_eq!(user.role, Role::Doctor);

        let auth_user = user.to_auth_user();
        assert_eq!(auth_user.id, user.id);
        assert_eq!(auth_user.role, Role::Doctor);
    }

    #[test]
    fn test_jwt_token_creation() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert!(token.contains('.'));
        assert_eq!(token.split('.').count(), 3);
    }
}
