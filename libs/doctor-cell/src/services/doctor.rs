use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{DoctorError, DoctorProfile, DoctorSearchQuery};

/// Columns exposed publicly for a doctor account. Credentials never leave the
/// users table.
const DOCTOR_COLUMNS: &str = "id,username,email,full_name,specialization,license_number";

pub struct DoctorService {
    supabase: SupabaseClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// List registered doctors, optionally narrowed by specialization or name.
    pub async fn list_doctors(
        &self,
        query: &DoctorSearchQuery,
    ) -> Result<Vec<DoctorProfile>, DoctorError> {
        debug!("Listing doctors with filters: {:?}", query);

        let mut query_parts = vec![
            "role=eq.doctor".to_string(),
            format!("select={}", DOCTOR_COLUMNS),
            "order=username.asc".to_string(),
        ];

        if let Some(ref specialization) = query.specialization {
            query_parts.push(format!(
                "specialization=ilike.*{}*",
                urlencoding::encode(specialization)
            ));
        }
        if let Some(ref name) = query.name {
            query_parts.push(format!("full_name=ilike.*{}*", urlencoding::encode(name)));
        }

        let path = format!("/rest/v1/users?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let doctors: Vec<DoctorProfile> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<DoctorProfile>, _>>()
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(doctors)
    }

    /// Get one doctor by id. Accounts with another role are not visible here.
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<DoctorProfile, DoctorError> {
        debug!("Fetching doctor profile: {}", doctor_id);

        let path = format!(
            "/rest/v1/users?id=eq.{}&role=eq.doctor&select={}",
            doctor_id, DOCTOR_COLUMNS
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        let doctor: DoctorProfile = serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(doctor)
    }
}
