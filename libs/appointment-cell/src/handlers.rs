// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthUser, Role};
use shared_models::error::AppError;

use crate::models::{AppointmentError, BookAppointmentRequest, UpdateAppointmentRequest};
use crate::services::booking::AppointmentBookingService;

// ==============================================================================
// APPOINTMENT HANDLERS (ALL REQUIRE AUTHENTICATION)
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .book_appointment(&user, request)
        .await
        .map_err(|e| match e {
            AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Only patients can book appointments".to_string())
            }
            AppointmentError::SlotUnavailable => AppError::Conflict(
                "Slot is not within the doctor's published availability".to_string(),
            ),
            AppointmentError::SlotAlreadyBooked => {
                AppError::Conflict("Slot is already booked".to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .get_appointment(appointment_id, &user)
        .await
        .map_err(|e| match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Not authorized to view this appointment".to_string())
            }
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let booking_service = AppointmentBookingService::new(&state);

    let appointment = booking_service
        .update_appointment(appointment_id, &user, request)
        .await
        .map_err(|e| match e {
            AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
            AppointmentError::Unauthorized => {
                AppError::Forbidden("Not authorized to update this appointment".to_string())
            }
            AppointmentError::SlotUnavailable => AppError::Conflict(
                "Slot is not within the doctor's published availability".to_string(),
            ),
            AppointmentError::SlotAlreadyBooked => {
                AppError::Conflict("Slot is already booked".to_string())
            }
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            _ => AppError::Database(e.to_string()),
        })?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment updated successfully"
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Doctor {
        return Err(AppError::Forbidden(
            "Only doctors can view their appointment book".to_string(),
        ));
    }

    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .list_for_doctor(user.id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_patient_appointments(
    State(state): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, AppError> {
    if user.role != Role::Patient {
        return Err(AppError::Forbidden(
            "Only patients can view their own appointments".to_string(),
        ));
    }

    let booking_service = AppointmentBookingService::new(&state);

    let appointments = booking_service
        .list_for_patient(user.id)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(Json(json!({
        "appointments": appointments,
        "total": appointments.len()
    })))
}
