use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::models::SlotLabel;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub slot: SlotLabel,
    pub status: AppointmentStatus,
    pub appointment_type: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Completed,
    Cancelled,
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

/// An appointment joined with the counterpart's display name: listings for a
/// patient carry the doctor's name and vice versa.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentWithName {
    #[serde(flatten)]
    pub appointment: Appointment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    /// Raw slot label, validated against the doctor's published availability.
    pub slot: String,
    pub appointment_type: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub status: Option<AppointmentStatus>,
    pub notes: Option<String>,
    pub date: Option<NaiveDate>,
    pub slot: Option<String>,
    pub appointment_type: Option<String>,
}

impl UpdateAppointmentRequest {
    /// Whether the request asks to move the appointment to another date/slot.
    pub fn requests_move(&self) -> bool {
        self.date.is_some() || self.slot.is_some()
    }
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Slot is not within the doctor's published availability")]
    SlotUnavailable,

    #[error("Slot is already booked")]
    SlotAlreadyBooked,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_serializes_snake_case() {
        assert_eq!(json!(AppointmentStatus::Scheduled), json!("scheduled"));
        assert_eq!(json!(AppointmentStatus::Cancelled), json!("cancelled"));

        let status: AppointmentStatus = serde_json::from_value(json!("completed")).unwrap();
        assert_eq!(status, AppointmentStatus::Completed);
    }

    #[test]
    fn test_update_request_detects_move() {
        let patch: UpdateAppointmentRequest =
            serde_json::from_value(json!({"notes": "bring referral"})).unwrap();
        assert!(!patch.requests_move());

        let patch: UpdateAppointmentRequest =
            serde_json::from_value(json!({"slot": "10:00"})).unwrap();
        assert!(patch.requests_move());

        let patch: UpdateAppointmentRequest =
            serde_json::from_value(json!({"date": "2024-07-01"})).unwrap();
        assert!(patch.requests_move());
    }

    #[test]
    fn test_listing_entry_flattens_and_skips_absent_name() {
        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            slot: SlotLabel::parse("09:00").unwrap(),
            status: AppointmentStatus::Scheduled,
            appointment_type: "consultation".to_string(),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let entry = AppointmentWithName {
            appointment,
            patient_name: Some("Alice Cooper".to_string()),
            doctor_name: None,
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["slot"], "09:00");
        assert_eq!(value["patient_name"], "Alice Cooper");
        assert!(value.get("doctor_name").is_none());
    }
}
