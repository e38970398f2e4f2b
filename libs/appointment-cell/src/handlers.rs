use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use doctor_cell::services::DoctorDirectoryService;
use serde_json::{json, Value};
use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
    UpdateAppointmentRequest,
};
use crate::services::SchedulingService;

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::DoctorNotFound => AppError::NotFound("Doctor not found".to_string()),
        AppointmentError::InvalidTime(msg) => AppError::Validation(msg),
        AppointmentError::OutsideAvailability => {
            AppError::Validation("Requested slot falls outside the doctor's availability".into())
        }
        AppointmentError::ConflictDetected => {
            AppError::Conflict("The requested slot is no longer available".to_string())
        }
        AppointmentError::InvalidStatusTransition(from) => {
            AppError::Validation(format!("Cannot change an appointment in {} status", from))
        }
        AppointmentError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        AppointmentError::Database(msg) => AppError::ExternalService(msg),
    }
}

fn store_for(config: &AppConfig) -> Arc<StoreClient> {
    Arc::new(StoreClient::new(
        config.store_url.clone(),
        config.store_service_key.clone(),
    ))
}

fn user_uuid(user: &AuthUser) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id).map_err(|_| AppError::Auth("Invalid user id in token".to_string()))
}

/// Resolves the doctor profile owned by the caller, for doctor-scoped access.
async fn doctor_profile_id(
    store: Arc<StoreClient>,
    user_id: Uuid,
) -> Result<Option<Uuid>, AppError> {
    let directory = DoctorDirectoryService::new(store);
    let profile = directory
        .get_doctor_by_user(user_id)
        .await
        .map_err(|e| AppError::ExternalService(e.to_string()))?;
    Ok(profile.map(|p| p.id))
}

/// The caller may see an appointment as its patient or as its doctor.
async fn check_access(
    store: Arc<StoreClient>,
    user: &AuthUser,
    user_id: Uuid,
    appointment: &Appointment,
) -> Result<(), AppError> {
    if user.is_patient() {
        if appointment.patient_id == user_id {
            return Ok(());
        }
    } else if user.is_doctor() {
        if doctor_profile_id(store, user_id).await? == Some(appointment.doctor_id) {
            return Ok(());
        }
    }
    Err(map_appointment_error(AppointmentError::Unauthorized))
}

/// POST /appointments
#[axum::debug_handler]
pub async fn book_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    if !user.is_patient() {
        return Err(AppError::Auth(
            "Only patient accounts can book appointments".to_string(),
        ));
    }
    let patient_id = user_uuid(&user)?;

    let service = SchedulingService::new(store_for(&config));
    let appointment = service
        .create_appointment(patient_id, request)
        .await
        .map_err(map_appointment_error)?;

    tracing::info!(
        appointment_id = %appointment.id,
        doctor_id = %appointment.doctor_id,
        "appointment booked"
    );
    Ok(Json(appointment))
}

/// GET /appointments
///
/// Patients see their own bookings; doctors see bookings against their
/// profile. A doctor without a profile has no bookings yet.
#[axum::debug_handler]
pub async fn list_appointments(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Query(filter): Query<AppointmentFilter>,
) -> Result<Json<Vec<Appointment>>, AppError> {
    let user_id = user_uuid(&user)?;
    let store = store_for(&config);
    let service = SchedulingService::new(store.clone());

    let appointments = if user.is_doctor() {
        match doctor_profile_id(store, user_id).await? {
            Some(doctor_id) => service
                .list_for_doctor(doctor_id, &filter)
                .await
                .map_err(map_appointment_error)?,
            None => Vec::new(),
        }
    } else {
        service
            .list_for_patient(user_id, &filter)
            .await
            .map_err(map_appointment_error)?
    };

    Ok(Json(appointments))
}

/// PUT /appointments/{appointment_id}
#[axum::debug_handler]
pub async fn update_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Appointment>, AppError> {
    let user_id = user_uuid(&user)?;
    let store = store_for(&config);
    let service = SchedulingService::new(store.clone());

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;
    check_access(store, &user, user_id, &appointment).await?;

    // Patients may cancel their own bookings; confirmation is the doctor's.
    if user.is_patient() && request.status != AppointmentStatus::Cancelled {
        return Err(AppError::Auth(
            "Patients can only cancel appointments".to_string(),
        ));
    }

    let updated = service
        .update_status(&appointment, request.status)
        .await
        .map_err(map_appointment_error)?;

    tracing::info!(
        appointment_id = %updated.id,
        status = %updated.status,
        "appointment status updated"
    );
    Ok(Json(updated))
}

/// DELETE /appointments/{appointment_id}
#[axum::debug_handler]
pub async fn delete_appointment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    let user_id = user_uuid(&user)?;
    let store = store_for(&config);
    let service = SchedulingService::new(store.clone());

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;
    check_access(store, &user, user_id, &appointment).await?;

    service
        .delete_appointment(appointment_id)
        .await
        .map_err(map_appointment_error)?;

    tracing::info!(appointment_id = %appointment_id, "appointment deleted");
    Ok(Json(json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn invalid_transition_is_a_validation_error() {
        let err = map_appointment_error(AppointmentError::InvalidStatusTransition(
            AppointmentStatus::Cancelled,
        ));
        assert_matches!(err, AppError::Validation(_));
    }

    #[test]
    fn lost_race_is_a_conflict() {
        assert_matches!(
            map_appointment_error(AppointmentError::ConflictDetected),
            AppError::Conflict(_)
        );
    }

    #[test]
    fn store_failures_surface_as_dependency_errors() {
        assert_matches!(
            map_appointment_error(AppointmentError::Database("store unreachable".into())),
            AppError::ExternalService(_)
        );
    }
}
