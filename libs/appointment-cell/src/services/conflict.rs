use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::{Appointment, AppointmentError};

/// Two half-open intervals `[start, end)` overlap when each starts before the
/// other ends. Back-to-back slots sharing a boundary do not overlap.
pub fn overlaps(
    start1: DateTime<Utc>,
    end1: DateTime<Utc>,
    start2: DateTime<Utc>,
    end2: DateTime<Utc>,
) -> bool {
    start1 < end2 && start2 < end1
}

pub struct ConflictChecker {
    store: Arc<StoreClient>,
}

impl ConflictChecker {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    /// Returns the doctor's active appointments that overlap `[start, end)`.
    ///
    /// The range filter fetches anything that ends after `start` and begins
    /// before `end`; the precise overlap test is re-applied in memory.
    pub async fn find_conflicts(
        &self,
        doctor_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?doctor_id=eq.{}&status=neq.cancelled&end_time=gt.{}&start_time=lt.{}",
            doctor_id,
            urlencoding::encode(&start.to_rfc3339()),
            urlencoding::encode(&end.to_rfc3339()),
        );

        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let mut conflicts = Vec::new();
        for row in rows {
            let appointment: Appointment = serde_json::from_value(row)
                .map_err(|e| AppointmentError::Database(e.to_string()))?;
            if appointment.is_active()
                && overlaps(start, end, appointment.start_time, appointment.end_time)
            {
                conflicts.push(appointment);
            }
        }
        Ok(conflicts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, minute, 0).unwrap()
    }

    #[test]
    fn detects_partial_overlap() {
        assert!(overlaps(at(9, 0), at(10, 0), at(9, 30), at(10, 30)));
        assert!(overlaps(at(9, 30), at(10, 30), at(9, 0), at(10, 0)));
    }

    #[test]
    fn detects_containment() {
        assert!(overlaps(at(9, 0), at(12, 0), at(10, 0), at(11, 0)));
        assert!(overlaps(at(10, 0), at(11, 0), at(9, 0), at(12, 0)));
    }

    #[test]
    fn identical_ranges_overlap() {
        assert!(overlaps(at(9, 0), at(10, 0), at(9, 0), at(10, 0)));
    }

    #[test]
    fn back_to_back_slots_do_not_overlap() {
        assert!(!overlaps(at(9, 0), at(10, 0), at(10, 0), at(11, 0)));
        assert!(!overlaps(at(10, 0), at(11, 0), at(9, 0), at(10, 0)));
    }

    #[test]
    fn disjoint_ranges_do_not_overlap() {
        assert!(!overlaps(at(9, 0), at(10, 0), at(14, 0), at(15, 0)));
    }
}
