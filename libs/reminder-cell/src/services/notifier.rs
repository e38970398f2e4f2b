use std::sync::Arc;

use appointment_cell::models::{Appointment, AppointmentStatus};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::ReminderError;
use crate::services::mail::MailGatewayClient;
use crate::services::sms::SmsGatewayClient;

#[derive(Debug, Deserialize)]
struct ContactRow {
    name: String,
    email: String,
    phone: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DoctorNameRow {
    name: String,
}

/// Finds confirmed appointments inside the reminder window and delivers
/// email plus SMS reminders for them.
pub struct ReminderService {
    store: Arc<StoreClient>,
    mail: MailGatewayClient,
    sms: SmsGatewayClient,
    lead_minutes: i64,
}

impl ReminderService {
    pub fn new(
        store: Arc<StoreClient>,
        mail: MailGatewayClient,
        sms: SmsGatewayClient,
        lead_minutes: i64,
    ) -> Self {
        Self {
            store,
            mail,
            sms,
            lead_minutes,
        }
    }

    /// Confirmed, un-reminded appointments starting within the lead window.
    pub async fn find_due_appointments(&self) -> Result<Vec<Appointment>, ReminderError> {
        let now = Utc::now();
        let horizon = now + Duration::minutes(self.lead_minutes);
        let path = format!(
            "/rest/v1/appointments?status=eq.confirmed&reminder_sent=eq.false&start_time=gte.{}&start_time=lte.{}",
            urlencoding::encode(&now.to_rfc3339()),
            urlencoding::encode(&horizon.to_rfc3339()),
        );

        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;

        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
            })
            .collect()
    }

    /// Delivers both reminders for one appointment, then flips the
    /// reminder flag.
    ///
    /// The flag is only set after both the email and the SMS went out, so a
    /// gateway failure leaves the appointment due for the next tick. The
    /// final PATCH filters on `reminder_sent=eq.false`; an empty result means
    /// another worker already delivered, which is not an error.
    ///
    /// Returns `Ok(true)` if this call marked the appointment.
    pub async fn send_reminder(&self, appointment_id: Uuid) -> Result<bool, ReminderError> {
        let appointment = match self.fetch_appointment(appointment_id).await? {
            Some(a) => a,
            None => return Ok(false),
        };
        if appointment.reminder_sent || appointment.status != AppointmentStatus::Confirmed {
            return Ok(false);
        }

        let patient = self.fetch_patient(appointment.patient_id).await?;
        let doctor_name = self.fetch_doctor_name(appointment.doctor_id).await?;

        let when = appointment.start_time.format("%Y-%m-%d %H:%M UTC");
        let message = format!(
            "Hi {}, this is a reminder of your appointment with {} at {}.",
            patient.name, doctor_name, when
        );

        self.mail
            .send_email(&patient.email, "Appointment reminder", &message)
            .await?;

        match &patient.phone {
            Some(phone) if !phone.trim().is_empty() => {
                self.sms.send_sms(phone, &message).await?;
            }
            _ => {
                tracing::debug!(
                    appointment_id = %appointment.id,
                    "patient has no phone number, skipping sms"
                );
            }
        }

        self.mark_reminder_sent(appointment.id).await
    }

    async fn mark_reminder_sent(&self, appointment_id: Uuid) -> Result<bool, ReminderError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&reminder_sent=eq.false",
            appointment_id
        );
        let body = json!({
            "reminder_sent": true,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows = self
            .store
            .update(&path, body)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn fetch_appointment(&self, id: Uuid) -> Result<Option<Appointment>, ReminderError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;
        match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| ReminderError::Database(e.to_string())),
            None => Ok(None),
        }
    }

    async fn fetch_patient(&self, id: Uuid) -> Result<ContactRow, ReminderError> {
        let path = format!("/rest/v1/users?id=eq.{}", id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| ReminderError::Database(format!("user {} not found", id)))?;
        serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))
    }

    async fn fetch_doctor_name(&self, doctor_id: Uuid) -> Result<String, ReminderError> {
        let path = format!("/rest/v1/doctors?id=eq.{}", doctor_id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| ReminderError::Database(e.to_string()))?;
        let row = rows.into_iter().next().ok_or_else(|| {
            ReminderError::Database(format!("doctor {} not found", doctor_id))
        })?;
        let doctor: DoctorNameRow =
            serde_json::from_value(row).map_err(|e| ReminderError::Database(e.to_string()))?;
        Ok(doctor.name)
    }

    /// One polling pass. Delivery failures are logged and left for the
    /// next tick.
    pub async fn run_tick(&self) {
        let due = match self.find_due_appointments().await {
            Ok(due) => due,
            Err(e) => {
                tracing::error!(error = %e, "failed to query due appointments");
                return;
            }
        };

        if due.is_empty() {
            return;
        }
        tracing::debug!(count = due.len(), "processing due reminders");

        for appointment in due {
            match self.send_reminder(appointment.id).await {
                Ok(true) => {
                    tracing::info!(appointment_id = %appointment.id, "reminder delivered");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(
                        appointment_id = %appointment.id,
                        error = %e,
                        "reminder delivery failed, will retry next tick"
                    );
                }
            }
        }
    }
}
