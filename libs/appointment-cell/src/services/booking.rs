// libs/appointment-cell/src/services/booking.rs
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use doctor_cell::models::SlotLabel;
use doctor_cell::services::AvailabilityService;
use shared_config::AppConfig;
use shared_database::supabase::{DbError, SupabaseClient};
use shared_models::auth::{AuthUser, Role};

use crate::models::{
    Appointment, AppointmentError, AppointmentStatus, AppointmentWithName,
    BookAppointmentRequest, UpdateAppointmentRequest,
};
use crate::services::conflict::ConflictService;

pub struct AppointmentBookingService {
    supabase: Arc<SupabaseClient>,
    conflict_service: ConflictService,
    availability_service: AvailabilityService,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        let conflict_service = ConflictService::new(Arc::clone(&supabase));
        let availability_service = AvailabilityService::new(config);

        Self {
            supabase,
            conflict_service,
            availability_service,
        }
    }

    /// Book a slot with a doctor on behalf of the authenticated patient.
    pub async fn book_appointment(
        &self,
        actor: &AuthUser,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking appointment: patient {} with doctor {} on {} at {}",
            actor.id, request.doctor_id, request.date, request.slot
        );

        // **Step 1: The target must be an existing doctor**
        self.verify_doctor_exists(request.doctor_id).await?;

        // **Step 2: Only patients book appointments, and only for themselves**
        if actor.role != Role::Patient {
            return Err(AppointmentError::Unauthorized);
        }

        // **Step 3: Validate the requested slot and type**
        let slot = SlotLabel::parse(&request.slot).map_err(AppointmentError::ValidationError)?;
        if request.appointment_type.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "appointment_type must not be empty".to_string(),
            ));
        }

        // **Step 4: The slot must sit inside the doctor's published availability**
        let window = self
            .availability_service
            .window_covering(request.doctor_id, request.date, slot)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if window.is_none() {
            warn!(
                "Slot {} on {} is outside published availability for doctor {}",
                slot, request.date, request.doctor_id
            );
            return Err(AppointmentError::SlotUnavailable);
        }

        // **Step 5: Friendly duplicate check before touching the unique index**
        if self
            .conflict_service
            .scheduled_booking_exists(request.doctor_id, request.date, slot, None)
            .await?
        {
            return Err(AppointmentError::SlotAlreadyBooked);
        }

        // **Step 6: Insert. Under concurrent requests the partial unique index
        // on (doctor_id, date, slot) where status = scheduled is the arbiter.**
        let now = Utc::now().to_rfc3339();
        let appointment_data = json!({
            "patient_id": actor.id,
            "doctor_id": request.doctor_id,
            "date": request.date,
            "slot": slot,
            "status": AppointmentStatus::Scheduled,
            "appointment_type": request.appointment_type,
            "notes": request.notes,
            "created_at": now,
            "updated_at": now
        });

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(appointment_data),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => AppointmentError::SlotAlreadyBooked,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError(
                "Failed to create appointment".to_string(),
            ));
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    /// Fetch a single appointment, visible only to its patient or doctor.
    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        actor: &AuthUser,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", appointment_id);

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::NotFound);
        }

        let appointment: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if appointment.patient_id != actor.id && appointment.doctor_id != actor.id {
            return Err(AppointmentError::Unauthorized);
        }

        Ok(appointment)
    }

    /// Patch an appointment. Status and notes always apply; date, slot and
    /// appointment_type only apply when the status after the patch is
    /// scheduled. A move is re-validated against availability and conflicts.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        actor: &AuthUser,
        request: UpdateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        info!("Updating appointment: {}", appointment_id);

        let appointment = self.get_appointment(appointment_id, actor).await?;

        let mut update_data = serde_json::Map::new();

        if let Some(status) = request.status {
            update_data.insert("status".to_string(), json!(status));
        }
        if let Some(ref notes) = request.notes {
            update_data.insert("notes".to_string(), json!(notes));
        }

        // The status the patch lands on gates the other fields: terms are
        // frozen while the appointment ends up outside `scheduled`, and
        // re-open when a patch restores it.
        let effective_status = request.status.unwrap_or(appointment.status);
        let terms_editable = effective_status == AppointmentStatus::Scheduled;

        if request.requests_move() || request.appointment_type.is_some() {
            if terms_editable {
                if let Some(ref appointment_type) = request.appointment_type {
                    if appointment_type.trim().is_empty() {
                        return Err(AppointmentError::ValidationError(
                            "appointment_type must not be empty".to_string(),
                        ));
                    }
                    update_data.insert("appointment_type".to_string(), json!(appointment_type));
                }

                if request.requests_move() {
                    let new_date = request.date.unwrap_or(appointment.date);
                    let new_slot = match request.slot {
                        Some(ref raw) => {
                            SlotLabel::parse(raw).map_err(AppointmentError::ValidationError)?
                        }
                        None => appointment.slot,
                    };

                    let window = self
                        .availability_service
                        .window_covering(appointment.doctor_id, new_date, new_slot)
                        .await
                        .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;
                    if window.is_none() {
                        return Err(AppointmentError::SlotUnavailable);
                    }

                    if self
                        .conflict_service
                        .scheduled_booking_exists(
                            appointment.doctor_id,
                            new_date,
                            new_slot,
                            Some(appointment_id),
                        )
                        .await?
                    {
                        return Err(AppointmentError::SlotAlreadyBooked);
                    }

                    update_data.insert("date".to_string(), json!(new_date));
                    update_data.insert("slot".to_string(), json!(new_slot));
                }
            } else {
                debug!(
                    "Dropping date/slot/type changes for appointment {} in status {}",
                    appointment_id, effective_status
                );
            }
        }

        update_data.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let result: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(Value::Object(update_data)),
                Some(representation_headers()),
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => AppointmentError::SlotAlreadyBooked,
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        if result.is_empty() {
            return Err(AppointmentError::DatabaseError(
                "Failed to update appointment".to_string(),
            ));
        }

        let updated: Appointment = serde_json::from_value(result[0].clone())
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        info!("Appointment {} updated", appointment_id);
        Ok(updated)
    }

    /// All appointments on a doctor's book, each with the patient's name.
    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
    ) -> Result<Vec<AppointmentWithName>, AppointmentError> {
        debug!("Listing appointments for doctor: {}", doctor_id);

        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&order=created_at.asc",
            doctor_id
        );
        let appointments = self.fetch_appointments(&path).await?;
        let names = self
            .display_names(appointments.iter().map(|a| a.patient_id))
            .await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let patient_name = names.get(&appointment.patient_id).cloned();
                AppointmentWithName {
                    appointment,
                    patient_name,
                    doctor_name: None,
                }
            })
            .collect())
    }

    /// All of a patient's appointments, each with the doctor's name.
    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<AppointmentWithName>, AppointmentError> {
        debug!("Listing appointments for patient: {}", patient_id);

        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&order=created_at.asc",
            patient_id
        );
        let appointments = self.fetch_appointments(&path).await?;
        let names = self
            .display_names(appointments.iter().map(|a| a.doctor_id))
            .await?;

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let doctor_name = names.get(&appointment.doctor_id).cloned();
                AppointmentWithName {
                    appointment,
                    patient_name: None,
                    doctor_name,
                }
            })
            .collect())
    }

    async fn verify_doctor_exists(&self, doctor_id: Uuid) -> Result<(), AppointmentError> {
        let path = format!(
            "/rest/v1/users?id=eq.{}&role=eq.doctor&select=id",
            doctor_id
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        if result.is_empty() {
            return Err(AppointmentError::DoctorNotFound);
        }

        Ok(())
    }

    async fn fetch_appointments(&self, path: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| {
                AppointmentError::DatabaseError(format!("Failed to parse appointments: {}", e))
            })
    }

    /// Batch-resolve user ids to display names in a single query.
    async fn display_names(
        &self,
        ids: impl Iterator<Item = Uuid>,
    ) -> Result<HashMap<Uuid, String>, AppointmentError> {
        let unique: BTreeSet<Uuid> = ids.collect();
        if unique.is_empty() {
            return Ok(HashMap::new());
        }

        let id_list = unique
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/rest/v1/users?id=in.({})&select=id,full_name", id_list);

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| AppointmentError::DatabaseError(e.to_string()))?;

        let mut names = HashMap::new();
        for row in result {
            if let (Some(id), Some(full_name)) = (
                row["id"].as_str().and_then(|s| Uuid::parse_str(s).ok()),
                row["full_name"].as_str(),
            ) {
                names.insert(id, full_name.to_string());
            }
        }

        Ok(names)
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
