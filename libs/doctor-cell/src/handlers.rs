use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::Deserialize;
use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use uuid::Uuid;

use crate::models::{DoctorError, DoctorProfile, UpsertDoctorProfileRequest};
use crate::services::DoctorDirectoryService;

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::NotFound => AppError::NotFound("Doctor not found".to_string()),
        DoctorError::Validation(msg) => AppError::Validation(msg),
        DoctorError::Database(msg) => AppError::ExternalService(msg),
    }
}

fn directory_service(config: &AppConfig) -> DoctorDirectoryService {
    let store = Arc::new(StoreClient::new(
        config.store_url.clone(),
        config.store_service_key.clone(),
    ));
    DoctorDirectoryService::new(store)
}

#[derive(Debug, Deserialize)]
pub struct ListDoctorsParams {
    pub specialty: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /doctors
#[axum::debug_handler]
pub async fn list_doctors(
    State(config): State<Arc<AppConfig>>,
    Query(params): Query<ListDoctorsParams>,
) -> Result<Json<Vec<DoctorProfile>>, AppError> {
    let service = directory_service(&config);
    let doctors = service
        .list_doctors(params.specialty.as_deref(), params.limit, params.offset)
        .await
        .map_err(map_doctor_error)?;
    Ok(Json(doctors))
}

/// GET /doctors/{doctor_id}
#[axum::debug_handler]
pub async fn get_doctor(
    State(config): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
) -> Result<Json<DoctorProfile>, AppError> {
    let service = directory_service(&config);
    let doctor = service.get_doctor(doctor_id).await.map_err(map_doctor_error)?;
    Ok(Json(doctor))
}

/// PUT /doctors/me
#[axum::debug_handler]
pub async fn upsert_my_profile(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpsertDoctorProfileRequest>,
) -> Result<Json<DoctorProfile>, AppError> {
    if !user.is_doctor() {
        return Err(AppError::Auth(
            "Only doctor accounts can manage a profile".to_string(),
        ));
    }

    let user_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let service = directory_service(&config);
    let profile = service
        .upsert_profile(user_id, request)
        .await
        .map_err(map_doctor_error)?;

    tracing::info!(doctor_id = %profile.id, "doctor profile updated");
    Ok(Json(profile))
}
