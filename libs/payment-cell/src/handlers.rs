use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use shared_config::AppConfig;
use shared_database::StoreClient;
use shared_models::auth::AuthUser;
use shared_models::error::AppError;
use uuid::Uuid;

use crate::models::{Payment, PaymentError, RecordPaymentRequest};
use crate::services::PaymentService;

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::AppointmentNotFound => {
            AppError::NotFound("Appointment not found".to_string())
        }
        PaymentError::Unauthorized => {
            AppError::Auth("Not authorized to record a payment for this appointment".to_string())
        }
        PaymentError::Validation(msg) => AppError::Validation(msg),
        PaymentError::Database(msg) => AppError::ExternalService(msg),
    }
}

/// POST /payment
#[axum::debug_handler]
pub async fn record_payment(
    State(config): State<Arc<AppConfig>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<Json<Payment>, AppError> {
    let patient_id = Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Invalid user id in token".to_string()))?;

    let store = Arc::new(StoreClient::new(
        config.store_url.clone(),
        config.store_service_key.clone(),
    ));
    let payment = PaymentService::new(store)
        .record_payment(patient_id, request)
        .await
        .map_err(map_payment_error)?;

    tracing::info!(
        payment_id = %payment.id,
        appointment_id = %payment.appointment_id,
        "payment recorded"
    );
    Ok(Json(payment))
}
