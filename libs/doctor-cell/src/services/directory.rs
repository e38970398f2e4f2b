use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::{DoctorError, DoctorProfile, UpsertDoctorProfileRequest};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 100;

/// Read/write access to the doctor directory.
pub struct DoctorDirectoryService {
    store: Arc<StoreClient>,
}

impl DoctorDirectoryService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// Lists doctor profiles ordered by name, optionally filtered by specialty.
    pub async fn list_doctors(
        &self,
        specialty: Option<&str>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<DoctorProfile>, DoctorError> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = offset.unwrap_or(0).max(0);

        let mut path = format!(
            "/rest/v1/doctors?order=name.asc&limit={}&offset={}",
            limit, offset
        );
        if let Some(specialty) = specialty {
            if !specialty.trim().is_empty() {
                path.push_str(&format!(
                    "&specialty=eq.{}",
                    urlencoding::encode(specialty.trim())
                ));
            }
        }

        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
            })
            .collect()
    }

    /// Fetches a single doctor profile by its id.
    pub async fn get_doctor(&self, doctor_id: Uuid) -> Result<DoctorProfile, DoctorError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        let row = rows.into_iter().next().ok_or(DoctorError::NotFound)?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }

    /// Looks up the profile owned by a user account, if one exists.
    pub async fn get_doctor_by_user(
        &self,
        user_id: Uuid,
    ) -> Result<Option<DoctorProfile>, DoctorError> {
        let path = format!("/rest/v1/doctors?user_id=eq.{}", user_id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| DoctorError::Database(e.to_string()))?;

        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| DoctorError::Database(e.to_string())),
            None => Ok(None),
        }
    }

    /// Creates or updates the profile owned by `user_id`.
    pub async fn upsert_profile(
        &self,
        user_id: Uuid,
        request: UpsertDoctorProfileRequest,
    ) -> Result<DoctorProfile, DoctorError> {
        if request.name.trim().is_empty() {
            return Err(DoctorError::Validation("name must not be empty".into()));
        }
        if request.specialty.trim().is_empty() {
            return Err(DoctorError::Validation(
                "specialty must not be empty".into(),
            ));
        }
        for window in &request.availability {
            if !window.is_valid() {
                return Err(DoctorError::Validation(format!(
                    "invalid availability window on day {}",
                    window.day_of_week
                )));
            }
        }

        let now = Utc::now();
        let existing = self.get_doctor_by_user(user_id).await?;

        let rows = match existing {
            Some(profile) => {
                let body = json!({
                    "name": request.name.trim(),
                    "specialty": request.specialty.trim(),
                    "bio": request.bio,
                    "profile_image_url": request.profile_image_url,
                    "availability": request.availability,
                    "updated_at": now.to_rfc3339(),
                });
                let path = format!("/rest/v1/doctors?id=eq.{}", profile.id);
                self.store
                    .update(&path, body)
                    .await
                    .map_err(|e| DoctorError::Database(e.to_string()))?
            }
            None => {
                let body = json!({
                    "id": Uuid::new_v4(),
                    "user_id": user_id,
                    "name": request.name.trim(),
                    "specialty": request.specialty.trim(),
                    "bio": request.bio,
                    "profile_image_url": request.profile_image_url,
                    "availability": request.availability,
                    "created_at": now.to_rfc3339(),
                    "updated_at": now.to_rfc3339(),
                });
                self.store
                    .insert("/rest/v1/doctors", body)
                    .await
                    .map_err(|e| DoctorError::Database(e.to_string()))?
            }
        };

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| DoctorError::Database("store returned no profile row".into()))?;
        serde_json::from_value(row).map_err(|e| DoctorError::Database(e.to_string()))
    }
}
