use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub method: String,
    pub amount: f64,
    pub paid_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordPaymentRequest {
    pub appointment_id: Uuid,
    pub method: String,
    pub amount: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Appointment not found")]
    AppointmentNotFound,
    #[error("Not authorized to record a payment for this appointment")]
    Unauthorized,
    #[error("Invalid payment: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(String),
}
