use std::sync::Arc;

use appointment_cell::models::Appointment;
use chrono::Utc;
use serde_json::json;
use shared_database::StoreClient;
use uuid::Uuid;

use crate::models::{Payment, PaymentError, RecordPaymentRequest};

/// Records payments against existing appointments. Payments are insert-only;
/// there is no refund or update path.
pub struct PaymentService {
    store: Arc<StoreClient>,
}

impl PaymentService {
    pub fn new(store: Arc<StoreClient>) -> Self {
        Self { store }
    }

    pub async fn record_payment(
        &self,
        patient_id: Uuid,
        request: RecordPaymentRequest,
    ) -> Result<Payment, PaymentError> {
        if request.amount <= 0.0 || !request.amount.is_finite() {
            return Err(PaymentError::Validation(
                "amount must be a positive number".to_string(),
            ));
        }
        if request.method.trim().is_empty() {
            return Err(PaymentError::Validation(
                "method must not be empty".to_string(),
            ));
        }

        let appointment = self.fetch_appointment(request.appointment_id).await?;
        if appointment.patient_id != patient_id {
            return Err(PaymentError::Unauthorized);
        }

        let body = json!({
            "id": Uuid::new_v4(),
            "appointment_id": request.appointment_id,
            "method": request.method.trim(),
            "amount": request.amount,
            "paid_at": Utc::now().to_rfc3339(),
        });

        let rows = self
            .store
            .insert("/rest/v1/payments", body)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| PaymentError::Database("store returned no payment row".into()))?;
        serde_json::from_value(row).map_err(|e| PaymentError::Database(e.to_string()))
    }

    async fn fetch_appointment(&self, appointment_id: Uuid) -> Result<Appointment, PaymentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| PaymentError::Database(e.to_string()))?;
        let row = rows
            .into_iter()
            .next()
            .ok_or(PaymentError::AppointmentNotFound)?;
        serde_json::from_value(row).map_err(|e| PaymentError::Database(e.to_string()))
    }
}
