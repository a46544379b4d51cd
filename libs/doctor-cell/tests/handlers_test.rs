use std::sync::Arc;

use assert_matches::assert_matches;
use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doctor_cell::handlers;
use doctor_cell::models::{AvailableSlotsQuery, DoctorSearchQuery, PublishWindowRequest};
use shared_models::error::AppError;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig, TestUser};

fn dated_request(date: &str, time_slots: &[&str]) -> PublishWindowRequest {
    serde_json::from_value(json!({
        "kind": "dated",
        "date": date,
        "time_slots": time_slots
    }))
    .unwrap()
}

#[tokio::test]
async fn test_publish_availability_rejects_wrong_actor() {
    let config = TestConfig::default().to_arc();
    let doctor = TestUser::doctor("drsmith");

    // Authorization fails before any request leaves the process
    let result = handlers::publish_availability(
        State(Arc::clone(&config)),
        Path(Uuid::new_v4()),
        Extension(doctor.to_auth_user()),
        Json(dated_request("2024-06-01", &["09:00"])),
    )
    .await;

    match result.unwrap_err() {
        AppError::Forbidden(msg) => assert!(msg.contains("Not authorized")),
        other => panic!("Expected forbidden error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_availability_rejects_empty_slot_list() {
    let config = TestConfig::default().to_arc();
    let doctor = TestUser::doctor("drsmith");

    let result = handlers::publish_availability(
        State(Arc::clone(&config)),
        Path(doctor.id),
        Extension(doctor.to_auth_user()),
        Json(dated_request("2024-06-01", &[])),
    )
    .await;

    match result.unwrap_err() {
        AppError::ValidationError(msg) => assert!(msg.contains("time_slots")),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_availability_rejects_out_of_range_weekday() {
    let config = TestConfig::default().to_arc();
    let doctor = TestUser::doctor("drsmith");

    let request: PublishWindowRequest = serde_json::from_value(json!({
        "kind": "recurring",
        "day_of_week": 7,
        "start_time": "09:00:00",
        "end_time": "17:00:00"
    }))
    .unwrap();

    let result = handlers::publish_availability(
        State(Arc::clone(&config)),
        Path(doctor.id),
        Extension(doctor.to_auth_user()),
        Json(request),
    )
    .await;

    match result.unwrap_err() {
        AppError::ValidationError(msg) => assert!(msg.contains("day_of_week")),
        other => panic!("Expected validation error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_publish_availability_canonicalizes_and_sorts_slots() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();
    let doctor = TestUser::doctor("drsmith");

    Mock::given(method("POST"))
        .and(path("/rest/v1/availability_windows"))
        .and(query_param("on_conflict", "doctor_id,date"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::dated_window_row(doctor.id, "2024-06-01", &["09:00", "09:30"]),
        ])))
        .mount(&mock_server)
        .await;

    // Duplicated and unordered labels in the request
    let result = handlers::publish_availability(
        State(Arc::clone(&config)),
        Path(doctor.id),
        Extension(doctor.to_auth_user()),
        Json(dated_request("2024-06-01", &["09:30", "9:00", "09:30"])),
    )
    .await;

    let (status, Json(body)) = result.unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);

    // The stored payload carries the deduplicated, sorted canonical labels
    let requests = mock_server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["time_slots"], json!(["09:00", "09:30"]));
}

#[tokio::test]
async fn test_list_doctors_applies_name_filter() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .and(query_param("role", "eq.doctor"))
        .and(query_param("full_name", "ilike.*house*"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::doctor_row(Uuid::new_v4(), "drhouse", "Dr. House"),
        ])))
        .mount(&mock_server)
        .await;

    let query = DoctorSearchQuery {
        specialization: None,
        name: Some("house".to_string()),
    };

    let result = handlers::list_doctors(State(Arc::clone(&config)), Query(query)).await;

    let Json(body) = result.unwrap();
    assert_eq!(body["total"], 1);
    assert_eq!(body["doctors"][0]["full_name"], "Dr. House");
}

#[tokio::test]
async fn test_get_available_slots_unknown_doctor() {
    let mock_server = MockServer::start().await;
    let mut test_config = TestConfig::default();
    test_config.supabase_url = mock_server.uri();
    let config = test_config.to_arc();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let query: AvailableSlotsQuery = serde_json::from_value(json!({
        "date": "2024-06-01"
    }))
    .unwrap();

    let result =
        handlers::get_available_slots(State(Arc::clone(&config)), Path(Uuid::new_v4()), Query(query))
            .await;

    assert_matches!(result.unwrap_err(), AppError::NotFound(_));
}
