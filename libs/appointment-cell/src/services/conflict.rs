// libs/appointment-cell/src/services/conflict.rs
use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::models::SlotLabel;
use shared_database::supabase::SupabaseClient;

use crate::models::AppointmentError;

/// Checks the appointments table for slot collisions. Only `scheduled`
/// rows count; completed and cancelled appointments leave their slot free.
pub struct ConflictService {
    supabase: Arc<SupabaseClient>,
}

impl ConflictService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    /// Whether a scheduled appointment already occupies `slot` for this
    /// doctor on `date`. `exclude_appointment_id` skips the appointment
    /// currently being moved so it does not collide with itself.
    pub async fn scheduled_booking_exists(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotLabel,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<bool, AppointmentError> {
        debug!(
            "Checking for scheduled booking: doctor {} on {} at {}",
            doctor_id, date, slot
        );

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            format!("date=eq.{}", date),
            format!("slot=eq.{}", urlencoding::encode(&slot.to_string())),
            "status=eq.scheduled".to_string(),
            "select=id".to_string(),
        ];

        if let Some(exclude_id) = exclude_appointment_id {
            query_parts.push(format!("id=neq.{}", exclude_id));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        Ok(!result.is_empty())
    }
}
