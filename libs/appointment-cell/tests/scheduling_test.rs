use std::sync::Arc;

use appointment_cell::models::{
    Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest,
};
use appointment_cell::services::SchedulingService;
use assert_matches::assert_matches;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use shared_database::StoreClient;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn service_for(server: &MockServer) -> SchedulingService {
    let store = Arc::new(StoreClient::new(server.uri(), "test-key".to_string()));
    SchedulingService::new(store)
}

fn tomorrow_at(hour: u32) -> DateTime<Utc> {
    (Utc::now() + Duration::days(1))
        .date_naive()
        .and_hms_opt(hour, 0, 0)
        .unwrap()
        .and_utc()
}

fn doctor_row(doctor_id: Uuid) -> serde_json::Value {
    json!({
        "id": doctor_id,
        "user_id": Uuid::new_v4(),
        "name": "Dr. Adeyemi",
        "specialty": "cardiology",
        "bio": null,
        "profile_image_url": null,
        "availability": [],
        "created_at": "2024-05-01T08:00:00Z",
        "updated_at": "2024-05-01T08:00:00Z",
    })
}

fn appointment_row(
    doctor_id: Uuid,
    patient_id: Uuid,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: &str,
) -> serde_json::Value {
    json!({
        "id": Uuid::new_v4(),
        "patient_id": patient_id,
        "doctor_id": doctor_id,
        "start_time": start.to_rfc3339(),
        "end_time": end.to_rfc3339(),
        "status": status,
        "reminder_sent": false,
        "created_at": Utc::now().to_rfc3339(),
        "updated_at": Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn booking_rejects_inverted_time_range() {
    let server = MockServer::start().await;

    let request = BookAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        start_time: tomorrow_at(10),
        end_time: tomorrow_at(9),
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn booking_rejects_zero_length_slot() {
    let server = MockServer::start().await;
    let at = tomorrow_at(10);

    let request = BookAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        start_time: at,
        end_time: at,
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
}

#[tokio::test]
async fn booking_rejects_past_start_time() {
    let server = MockServer::start().await;

    let request = BookAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        start_time: Utc::now() - Duration::hours(2),
        end_time: Utc::now() - Duration::hours(1),
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::InvalidTime(_)));
}

#[tokio::test]
async fn booking_fails_for_unknown_doctor() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let request = BookAppointmentRequest {
        doctor_id: Uuid::new_v4(),
        start_time: tomorrow_at(9),
        end_time: tomorrow_at(10),
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::DoctorNotFound));
}

#[tokio::test]
async fn booking_succeeds_for_free_slot() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let start = tomorrow_at(9);
    let end = tomorrow_at(10);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id)])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "lock_key": "k" }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            appointment_row(doctor_id, patient_id, start, end, "pending")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lock_key": "k" }])))
        .expect(1)
        .mount(&server)
        .await;

    let request = BookAppointmentRequest {
        doctor_id,
        start_time: start,
        end_time: end,
    };

    let appointment = service_for(&server)
        .create_appointment(patient_id, request)
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
    assert!(!appointment.reminder_sent);
}

#[tokio::test]
async fn booking_rejects_overlapping_slot_and_releases_lock() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let start = tomorrow_at(9);
    let end = tomorrow_at(10);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id)])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "lock_key": "k" }])))
        .mount(&server)
        .await;

    // An existing confirmed booking overlapping the requested slot.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([appointment_row(
            doctor_id,
            Uuid::new_v4(),
            start - Duration::minutes(30),
            end - Duration::minutes(30),
            "confirmed"
        )])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lock_key": "k" }])))
        .expect(1)
        .mount(&server)
        .await;

    let request = BookAppointmentRequest {
        doctor_id,
        start_time: start,
        end_time: end,
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn booking_rejects_slot_when_lock_is_held() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id)])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    // The holder's lock has not expired, so nothing is reclaimable.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let request = BookAppointmentRequest {
        doctor_id,
        start_time: tomorrow_at(9),
        end_time: tomorrow_at(10),
    };

    let result = service_for(&server)
        .create_appointment(Uuid::new_v4(), request)
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn overlapping_ranges_contend_on_the_same_lock() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id)])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "lock_key": "k" }])))
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lock_key": "k" }])))
        .mount(&server)
        .await;

    let first_start = tomorrow_at(9);
    let first_end = first_start + Duration::minutes(30);

    // First booking sees a free calendar.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            appointment_row(doctor_id, patient_id, first_start, first_end, "pending")
        ])))
        .mount(&server)
        .await;

    // The second, shifted-but-overlapping booking sees the first one.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            appointment_row(doctor_id, patient_id, first_start, first_end, "pending")
        ])))
        .mount(&server)
        .await;

    let service = service_for(&server);
    let first = service
        .create_appointment(
            patient_id,
            BookAppointmentRequest {
                doctor_id,
                start_time: first_start,
                end_time: first_end,
            },
        )
        .await;
    let second = service
        .create_appointment(
            patient_id,
            BookAppointmentRequest {
                doctor_id,
                start_time: first_start + Duration::minutes(15),
                end_time: first_end + Duration::minutes(15),
            },
        )
        .await;

    assert!(first.is_ok());
    assert_matches!(second, Err(AppointmentError::ConflictDetected));

    // Both acquisitions must target the same lock row, otherwise two truly
    // concurrent requests would never contend on the unique constraint.
    let lock_keys: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "POST" && r.url.path() == "/rest/v1/slot_locks")
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            body["lock_key"].as_str().unwrap().to_string()
        })
        .collect();

    assert_eq!(lock_keys.len(), 2);
    assert_eq!(lock_keys[0], lock_keys[1]);
}

#[tokio::test]
async fn expired_lock_is_reclaimed() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();
    let start = tomorrow_at(9);
    let end = tomorrow_at(10);

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row(doctor_id)])))
        .mount(&server)
        .await;

    // A stale row from a crashed booking blocks the first insert.
    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // The expiry-filtered delete reaps it, and the retried insert wins.
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "lock_key": "k" }])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/slot_locks"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "lock_key": "k" }])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            appointment_row(doctor_id, patient_id, start, end, "pending")
        ])))
        .mount(&server)
        .await;

    let appointment = service_for(&server)
        .create_appointment(
            patient_id,
            BookAppointmentRequest {
                doctor_id,
                start_time: start,
                end_time: end,
            },
        )
        .await
        .unwrap();

    assert_eq!(appointment.status, AppointmentStatus::Pending);
}

#[tokio::test]
async fn update_status_reports_conflict_when_row_moved() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let start = tomorrow_at(9);
    let end = tomorrow_at(10);

    let appointment: Appointment = serde_json::from_value(appointment_row(
        doctor_id,
        Uuid::new_v4(),
        start,
        end,
        "pending",
    ))
    .unwrap();

    // The status filter no longer matches, so the PATCH touches nothing.
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .update_status(&appointment, AppointmentStatus::Confirmed)
        .await;

    assert_matches!(result, Err(AppointmentError::ConflictDetected));
}

#[tokio::test]
async fn update_status_rejects_transition_out_of_cancelled() {
    let server = MockServer::start().await;
    let appointment: Appointment = serde_json::from_value(appointment_row(
        Uuid::new_v4(),
        Uuid::new_v4(),
        tomorrow_at(9),
        tomorrow_at(10),
        "cancelled",
    ))
    .unwrap();

    let result = service_for(&server)
        .update_status(&appointment, AppointmentStatus::Confirmed)
        .await;

    assert_matches!(
        result,
        Err(AppointmentError::InvalidStatusTransition(
            AppointmentStatus::Cancelled
        ))
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn delete_missing_appointment_returns_not_found() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .delete_appointment(Uuid::new_v4())
        .await;

    assert_matches!(result, Err(AppointmentError::NotFound));
}
