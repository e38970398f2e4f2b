use crate::models::{AppointmentError, AppointmentStatus};

/// Transitions allowed from each status. Cancelled is terminal.
pub fn valid_transitions(from: AppointmentStatus) -> Vec<AppointmentStatus> {
    match from {
        AppointmentStatus::Pending => {
            vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled]
        }
        AppointmentStatus::Confirmed => vec![AppointmentStatus::Cancelled],
        AppointmentStatus::Cancelled => vec![],
    }
}

pub fn validate_status_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), AppointmentError> {
    if valid_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(AppointmentError::InvalidStatusTransition(from))
    }
}
