use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::store::StoreClient;
use shared_utils::jwt::sign_token;

use crate::models::{AuthError, LoginRequest, RegisterRequest, UserRecord};
use crate::services::password::{hash_password, verify_password};

const MIN_PASSWORD_LENGTH: usize = 8;

pub struct AccountService {
    store: Arc<StoreClient>,
    jwt_secret: String,
}

impl AccountService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            store: Arc::new(StoreClient::new(
                config.store_url.clone(),
                config.store_service_key.clone(),
            )),
            jwt_secret: config.jwt_secret.clone(),
        }
    }

    pub fn with_store(store: Arc<StoreClient>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    /// Register a new user. The email must not already be present; the store's
    /// unique constraint backs up the pre-check, so two concurrent
    /// registrations for the same email cannot both succeed.
    pub async fn register(&self, request: RegisterRequest) -> Result<Uuid, AuthError> {
        Self::validate_registration(&request)?;

        let path = format!(
            "/rest/v1/users?email=eq.{}&select=id",
            urlencoding::encode(&request.email)
        );
        let existing = self
            .store
            .select(&path)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if !existing.is_empty() {
            debug!("Registration rejected, email already present");
            return Err(AuthError::EmailTaken);
        }

        let password_hash =
            hash_password(&request.password).map_err(|e| AuthError::Validation(e.to_string()))?;

        let user_id = Uuid::new_v4();
        let row = json!({
            "id": user_id,
            "name": request.name,
            "email": request.email,
            "password_hash": password_hash,
            "role": request.role,
            "phone": request.phone,
            "created_at": Utc::now().to_rfc3339(),
        });

        let inserted = self
            .store
            .try_insert("/rest/v1/users", row)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if inserted.is_none() {
            // Lost a race with a concurrent registration for the same email.
            warn!("Registration conflict on unique email constraint");
            return Err(AuthError::EmailTaken);
        }

        info!("Registered new {} account {}", request.role, user_id);
        Ok(user_id)
    }

    /// Validate credentials and issue a session token. Unknown email and wrong
    /// password produce the same error.
    pub async fn login(&self, request: LoginRequest) -> Result<String, AuthError> {
        let path = format!(
            "/rest/v1/users?email=eq.{}",
            urlencoding::encode(&request.email)
        );
        let rows = self
            .store
            .select(&path)
            .await
            .map_err(|e| AuthError::Database(e.to_string()))?;

        if rows.is_empty() {
            debug!("Login rejected, unknown email");
            return Err(AuthError::InvalidCredentials);
        }

        let user: UserRecord = serde_json::from_value(rows[0].clone())
            .map_err(|e| AuthError::Database(format!("Failed to parse user: {}", e)))?;

        let matches = verify_password(&request.password, &user.password_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        if !matches {
            debug!("Login rejected for user {}, password mismatch", user.id);
            return Err(AuthError::InvalidCredentials);
        }

        let token = sign_token(
            &user.id.to_string(),
            &user.email,
            &user.role.to_string(),
            &self.jwt_secret,
        )
        .map_err(AuthError::Token)?;

        info!("User {} logged in", user.id);
        Ok(token)
    }

    fn validate_registration(request: &RegisterRequest) -> Result<(), AuthError> {
        if request.name.trim().is_empty() {
            return Err(AuthError::Validation("Name must not be empty".to_string()));
        }

        let email = request.email.trim();
        if !email.contains('@') || !email.contains('.') || email.len() < 5 {
            return Err(AuthError::Validation("Invalid email address".to_string()));
        }

        if request.password.len() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters long",
                MIN_PASSWORD_LENGTH
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;

    fn request(email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Alice".to_string(),
            email: email.to_string(),
            password: password.to_string(),
            role: UserRole::Patient,
            phone: None,
        }
    }

    #[test]
    fn registration_rejects_bad_email() {
        assert!(AccountService::validate_registration(&request("not-an-email", "longenough"))
            .is_err());
    }

    #[test]
    fn registration_rejects_short_password() {
        assert!(AccountService::validate_registration(&request("a@x.com", "short")).is_err());
    }

    #[test]
    fn registration_accepts_valid_input() {
        assert!(AccountService::validate_registration(&request("a@x.com", "longenough")).is_ok());
    }
}
