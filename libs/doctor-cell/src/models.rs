use chrono::{DateTime, Datelike, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A weekly availability window. `day_of_week` follows the store convention:
/// 0 = Sunday, 1 = Monday, ... 6 = Saturday.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AvailabilityWindow {
    pub fn is_valid(&self) -> bool {
        (0..=6).contains(&self.day_of_week) && self.start_time < self.end_time
    }

    /// Whether a UTC time range falls inside this window on the right weekday.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let weekday = start.weekday().num_days_from_sunday() as i32;
        weekday == self.day_of_week
            && start.date_naive() == end.date_naive()
            && self.start_time <= start.time()
            && end.time() <= self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    pub availability: Vec<AvailabilityWindow>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DoctorProfile {
    /// A profile without declared windows is treated as always bookable; the
    /// directory never had availability for every doctor.
    pub fn is_within_availability(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.availability.is_empty() || self.availability.iter().any(|w| w.covers(start, end))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpsertDoctorProfileRequest {
    pub name: String,
    pub specialty: String,
    pub bio: Option<String>,
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub availability: Vec<AvailabilityWindow>,
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(String),
}
