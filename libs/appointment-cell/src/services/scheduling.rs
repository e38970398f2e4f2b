use std::sync::Arc;

use chrono::Utc;
use doctor_cell::services::DoctorDirectoryService;
use serde_json::json;
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::{
    Appointment, AppointmentError, AppointmentFilter, AppointmentStatus, BookAppointmentRequest,
};
use crate::services::conflict::ConflictChecker;
use crate::services::lifecycle::validate_status_transition;

const LOCK_TTL_SECS: i64 = 30;

/// Books, lists, and transitions appointments against the HTTP store.
pub struct SchedulingService {
    store: Arc<StoreClient>,
    conflicts: ConflictChecker,
    directory: DoctorDirectoryService,
}

impl SchedulingService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self {
            conflicts: ConflictChecker::new(store.clone()),
            directory: DoctorDirectoryService::new(store.clone()),
            store,
        }
    }

    /// Books a new appointment for `patient_id`.
    ///
    /// Booking is serialized per doctor through a lock row keyed on the
    /// doctor id alone. Overlapping ranges are not equal, so a finer key
    /// would let two such requests take different lock rows and both pass
    /// the conflict check; one key per doctor makes them contend.
    pub async fn create_appointment(
        &self,
        patient_id: Uuid,
        request: BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        if request.start_time >= request.end_time {
            return Err(AppointmentError::InvalidTime(
                "start_time must be before end_time".to_string(),
            ));
        }
        if request.start_time <= Utc::now() {
            return Err(AppointmentError::InvalidTime(
                "appointment must be scheduled in the future".to_string(),
            ));
        }

        let doctor = self
            .directory
            .get_doctor(request.doctor_id)
            .await
            .map_err(|e| match e {
                doctor_cell::models::DoctorError::NotFound => AppointmentError::DoctorNotFound,
                other => AppointmentError::Database(other.to_string()),
            })?;

        if !doctor.is_within_availability(request.start_time, request.end_time) {
            return Err(AppointmentError::OutsideAvailability);
        }

        let lock_key = format!("doctor:{}", request.doctor_id);
        self.acquire_slot_lock(&lock_key, request.doctor_id).await?;

        let booked = self.book_under_lock(patient_id, &request).await;
        self.release_slot_lock(&lock_key).await;
        booked
    }

    async fn book_under_lock(
        &self,
        patient_id: Uuid,
        request: &BookAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        let conflicts = self
            .conflicts
            .find_conflicts(request.doctor_id, request.start_time, request.end_time)
            .await?;
        if !conflicts.is_empty() {
            return Err(AppointmentError::ConflictDetected);
        }

        let now = Utc::now();
        let body = json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": request.doctor_id,
            "start_time": request.start_time.to_rfc3339(),
            "end_time": request.end_time.to_rfc3339(),
            "status": AppointmentStatus::Pending,
            "reminder_sent": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let rows = self
            .store
            .insert("/rest/v1/appointments", body)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("store returned no appointment row".into()))?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Locks carry an expiry so a crash between acquire and release cannot
    /// wedge a doctor's bookings. On contention, expired rows are cleared and
    /// the insert retried once; a live holder still wins.
    async fn acquire_slot_lock(
        &self,
        lock_key: &str,
        doctor_id: Uuid,
    ) -> Result<(), AppointmentError> {
        let now = Utc::now();
        let body = json!({
            "lock_key": lock_key,
            "doctor_id": doctor_id,
            "acquired_at": now.to_rfc3339(),
            "expires_at": (now + chrono::Duration::seconds(LOCK_TTL_SECS)).to_rfc3339(),
        });
        match self.store.try_insert("/rest/v1/slot_locks", body.clone()).await {
            Ok(Some(_)) => return Ok(()),
            Ok(None) => {}
            Err(e) => return Err(AppointmentError::Database(e.to_string())),
        }

        let reap_path = format!(
            "/rest/v1/slot_locks?lock_key=eq.{}&expires_at=lt.{}",
            urlencoding::encode(lock_key),
            urlencoding::encode(&Utc::now().to_rfc3339()),
        );
        let reaped = self
            .store
            .delete(&reap_path)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        if reaped.is_empty() {
            return Err(AppointmentError::ConflictDetected);
        }
        tracing::warn!(lock_key, "reclaimed expired slot lock");

        match self.store.try_insert("/rest/v1/slot_locks", body).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(AppointmentError::ConflictDetected),
            Err(e) => Err(AppointmentError::Database(e.to_string())),
        }
    }

    async fn release_slot_lock(&self, lock_key: &str) {
        let path = format!(
            "/rest/v1/slot_locks?lock_key=eq.{}",
            urlencoding::encode(lock_key)
        );
        if let Err(e) = self.store.delete(&path).await {
            tracing::warn!(lock_key, error = %e, "failed to release slot lock");
        }
    }

    pub async fn get_appointment(&self, id: Uuid) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        let row = rows.into_iter().next().ok_or(AppointmentError::NotFound)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    pub async fn list_for_patient(
        &self,
        patient_id: Uuid,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list(&format!("patient_id=eq.{}", patient_id), filter)
            .await
    }

    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        self.list(&format!("doctor_id=eq.{}", doctor_id), filter)
            .await
    }

    async fn list(
        &self,
        owner_filter: &str,
        filter: &AppointmentFilter,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![
            owner_filter.to_string(),
            "order=start_time.asc".to_string(),
        ];
        if let Some(status) = filter.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from) = filter.from {
            query_parts.push(format!(
                "start_time=gte.{}",
                urlencoding::encode(&from.to_rfc3339())
            ));
        }
        if let Some(to) = filter.to {
            query_parts.push(format!(
                "start_time=lte.{}",
                urlencoding::encode(&to.to_rfc3339())
            ));
        }

        let path = format!("/rest/v1/appointments?{}", query_parts.join("&"));
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
            })
            .collect()
    }

    /// Applies a status transition with an optimistic check on the current
    /// status. An empty PATCH result means another writer moved the row first.
    pub async fn update_status(
        &self,
        appointment: &Appointment,
        new_status: AppointmentStatus,
    ) -> Result<Appointment, AppointmentError> {
        validate_status_transition(appointment.status, new_status)?;

        let path = format!(
            "/rest/v1/appointments?id=eq.{}&status=eq.{}",
            appointment.id, appointment.status
        );
        let body = json!({
            "status": new_status,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows = self
            .store
            .update(&path, body)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or(AppointmentError::ConflictDetected)?;
        serde_json::from_value(row).map_err(|e| AppointmentError::Database(e.to_string()))
    }

    pub async fn delete_appointment(&self, id: Uuid) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self
            .store
            .delete(&path)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        if rows.is_empty() {
            return Err(AppointmentError::NotFound);
        }
        Ok(())
    }
}
