use std::sync::Arc;

use axum::extract::{Json, State};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::AppConfig;
use shared_models::auth::TokenResponse;
use shared_models::error::AppError;

use crate::models::{AuthError, LoginRequest, RegisterRequest};
use crate::services::account::AccountService;

fn map_auth_error(e: AuthError) -> AppError {
    match e {
        AuthError::EmailTaken => AppError::Validation("Email already registered".to_string()),
        AuthError::InvalidCredentials => AppError::Auth("invalid email or password".to_string()),
        AuthError::Validation(msg) => AppError::Validation(msg),
        AuthError::Token(msg) => AppError::Internal(msg),
        AuthError::Database(msg) => AppError::ExternalService(msg),
    }
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<Value>, AppError> {
    debug!("Registering user with role {}", request.role);

    let service = AccountService::new(&state);
    let user_id = service.register(request).await.map_err(map_auth_error)?;

    Ok(Json(json!({
        "success": true,
        "user_id": user_id,
        "message": "User registered successfully"
    })))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    debug!("Login attempt");

    let service = AccountService::new(&state);
    let token = service.login(request).await.map_err(map_auth_error)?;

    Ok(Json(TokenResponse { token }))
}
