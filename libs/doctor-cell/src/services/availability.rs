use std::collections::BTreeSet;

use chrono::{Datelike, Duration, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{AuthUser, Role};

use crate::models::{
    AvailabilityQuery, AvailabilityWindow, AvailableSlotsResponse, DoctorError,
    PublishWindowRequest, SlotLabel, WindowShape,
};

/// Granularity used when expanding a recurring window into bookable labels.
const SLOT_STEP_MINUTES: i64 = 30;

pub struct AvailabilityService {
    supabase: SupabaseClient,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
        }
    }

    /// Publish an availability window for a doctor. A dated window replaces
    /// any previous window for the same date, a recurring one replaces the
    /// window for the same weekday.
    pub async fn publish_window(
        &self,
        doctor_id: Uuid,
        actor: &AuthUser,
        request: PublishWindowRequest,
    ) -> Result<AvailabilityWindow, DoctorError> {
        debug!("Publishing availability window for doctor: {}", doctor_id);

        if actor.role != Role::Doctor || actor.id != doctor_id {
            return Err(DoctorError::NotAuthorized);
        }

        let (window_data, on_conflict) = match request {
            PublishWindowRequest::Dated { date, time_slots } => {
                if time_slots.is_empty() {
                    return Err(DoctorError::Validation(
                        "time_slots must not be empty".to_string(),
                    ));
                }

                let mut labels = BTreeSet::new();
                for raw in &time_slots {
                    let label = SlotLabel::parse(raw).map_err(DoctorError::Validation)?;
                    labels.insert(label);
                }
                let labels: Vec<SlotLabel> = labels.into_iter().collect();

                let data = json!({
                    "doctor_id": doctor_id,
                    "kind": "dated",
                    "date": date,
                    "time_slots": labels,
                    "updated_at": Utc::now().to_rfc3339()
                });
                (data, "doctor_id,date")
            }
            PublishWindowRequest::Recurring {
                day_of_week,
                start_time,
                end_time,
                is_available,
            } => {
                if day_of_week > 6 {
                    return Err(DoctorError::Validation(
                        "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                    ));
                }
                if start_time >= end_time {
                    return Err(DoctorError::Validation(
                        "start_time must be before end_time".to_string(),
                    ));
                }

                let data = json!({
                    "doctor_id": doctor_id,
                    "kind": "recurring",
                    "day_of_week": day_of_week,
                    "start_time": start_time.format("%H:%M:%S").to_string(),
                    "end_time": end_time.format("%H:%M:%S").to_string(),
                    "is_available": is_available,
                    "updated_at": Utc::now().to_rfc3339()
                });
                (data, "doctor_id,day_of_week")
            }
        };

        let path = format!(
            "/rest/v1/availability_windows?on_conflict={}",
            on_conflict
        );
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            "Prefer",
            reqwest::header::HeaderValue::from_static(
                "resolution=merge-duplicates,return=representation",
            ),
        );

        let result: Vec<Value> = self
            .supabase
            .request_with_headers(Method::POST, &path, Some(window_data), Some(headers))
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        if result.is_empty() {
            return Err(DoctorError::Database(
                "Failed to store availability window".to_string(),
            ));
        }

        let window: AvailabilityWindow = serde_json::from_value(result[0].clone())
            .map_err(|e| DoctorError::Database(e.to_string()))?;
        debug!("Availability window stored with ID: {}", window.id);

        Ok(window)
    }

    /// Published windows for a doctor, optionally narrowed to one date or
    /// one weekday. Dated windows sort first, then recurring by weekday.
    pub async fn list_windows(
        &self,
        doctor_id: Uuid,
        filter: &AvailabilityQuery,
    ) -> Result<Vec<AvailabilityWindow>, DoctorError> {
        debug!("Fetching availability windows for doctor: {}", doctor_id);

        if let Some(day_of_week) = filter.day_of_week {
            if day_of_week > 6 {
                return Err(DoctorError::Validation(
                    "day_of_week must be between 0 (Sunday) and 6 (Saturday)".to_string(),
                ));
            }
        }

        let mut query_parts = vec![
            format!("doctor_id=eq.{}", doctor_id),
            "order=kind.asc,date.asc,day_of_week.asc".to_string(),
        ];
        if let Some(date) = filter.date {
            query_parts.push(format!("date=eq.{}", date));
        }
        if let Some(day_of_week) = filter.day_of_week {
            query_parts.push(format!("day_of_week=eq.{}", day_of_week));
        }

        let path = format!("/rest/v1/availability_windows?{}", query_parts.join("&"));
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(windows)
    }

    /// Find a window that makes `slot` bookable on `date`, if any. Dated
    /// windows win over recurring ones when both cover the slot.
    pub async fn window_covering(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
        slot: SlotLabel,
    ) -> Result<Option<AvailabilityWindow>, DoctorError> {
        let day_of_week = date.weekday().num_days_from_sunday();
        let path = format!(
            "/rest/v1/availability_windows?doctor_id=eq.{}&or=(date.eq.{},day_of_week.eq.{})&order=kind.asc",
            doctor_id, date, day_of_week
        );

        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        Ok(windows.into_iter().find(|w| w.shape.covers(date, slot)))
    }

    /// Bookable slots for a doctor on one date: the published windows for
    /// that day minus slots already taken by a scheduled appointment.
    pub async fn available_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<AvailableSlotsResponse, DoctorError> {
        debug!("Calculating available slots for doctor {} on {}", doctor_id, date);

        let doctor_path = format!("/rest/v1/users?id=eq.{}&role=eq.doctor&select=id", doctor_id);
        let doctor_result: Vec<Value> = self
            .supabase
            .request(Method::GET, &doctor_path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        if doctor_result.is_empty() {
            return Err(DoctorError::NotFound);
        }

        let day_of_week = date.weekday().num_days_from_sunday();
        let windows_path = format!(
            "/rest/v1/availability_windows?doctor_id=eq.{}&or=(date.eq.{},day_of_week.eq.{})",
            doctor_id, date, day_of_week
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &windows_path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let windows: Vec<AvailabilityWindow> = result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<AvailabilityWindow>, _>>()
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let mut slots = BTreeSet::new();
        for window in &windows {
            match &window.shape {
                WindowShape::Dated {
                    date: window_date,
                    time_slots,
                } => {
                    if *window_date == date {
                        slots.extend(time_slots.iter().copied());
                    }
                }
                WindowShape::Recurring {
                    day_of_week: dow,
                    start_time,
                    end_time,
                    is_available,
                } => {
                    if !is_available || u32::from(*dow) != day_of_week {
                        continue;
                    }
                    let mut t = *start_time;
                    while t < *end_time {
                        slots.insert(SlotLabel::from(t));
                        let next = t + Duration::minutes(SLOT_STEP_MINUTES);
                        // NaiveTime arithmetic wraps at midnight
                        if next <= t {
                            break;
                        }
                        t = next;
                    }
                }
            }
        }

        let booked = self.booked_slots(doctor_id, date).await?;
        let available: Vec<SlotLabel> = slots.difference(&booked).copied().collect();

        debug!("Found {} available slots", available.len());
        Ok(AvailableSlotsResponse {
            doctor_id,
            date,
            slots: available,
        })
    }

    async fn booked_slots(
        &self,
        doctor_id: Uuid,
        date: NaiveDate,
    ) -> Result<BTreeSet<SlotLabel>, DoctorError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&date=eq.{}&status=eq.scheduled&select=slot",
            doctor_id, date
        );
        let result: Vec<Value> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let mut booked = BTreeSet::new();
        for row in result {
            if let Some(raw) = row["slot"].as_str() {
                if let Ok(label) = SlotLabel::parse(raw) {
                    booked.insert(label);
                }
            }
        }

        Ok(booked)
    }
}
