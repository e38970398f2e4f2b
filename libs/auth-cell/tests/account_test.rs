use std::sync::Arc;

use assert_matches::assert_matches;
use auth_cell::models::{AuthError, LoginRequest, RegisterRequest, UserRole};
use auth_cell::services::password::hash_password;
use auth_cell::services::AccountService;
use chrono::Utc;
use serde_json::json;
use shared_database::StoreClient;
use shared_utils::jwt::validate_token;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_SECRET: &str = "test-jwt-secret";

fn service_for(server: &MockServer) -> AccountService {
    let store = Arc::new(StoreClient::new(server.uri(), "test-key".to_string()));
    AccountService::with_store(store, TEST_SECRET.to_string())
}

fn register_request(email: &str) -> RegisterRequest {
    RegisterRequest {
        name: "Ada Obi".to_string(),
        email: email.to_string(),
        password: "correct horse battery".to_string(),
        role: UserRole::Patient,
        phone: None,
    }
}

fn user_row(id: Uuid, email: &str, password: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": "Ada Obi",
        "email": email,
        "password_hash": hash_password(password).unwrap(),
        "role": "patient",
        "phone": null,
        "created_at": Utc::now().to_rfc3339(),
    })
}

#[tokio::test]
async fn register_creates_user_when_email_free() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([{ "id": Uuid::new_v4() }])))
        .expect(1)
        .mount(&server)
        .await;

    let result = service_for(&server)
        .register(register_request("ada@example.test"))
        .await;

    assert!(result.is_ok());
}

#[tokio::test]
async fn register_rejects_duplicate_email() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])),
        )
        .mount(&server)
        .await;

    let result = service_for(&server)
        .register(register_request("ada@example.test"))
        .await;

    assert_matches!(result, Err(AuthError::EmailTaken));
}

#[tokio::test]
async fn register_rejects_duplicate_email_lost_race() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .register(register_request("ada@example.test"))
        .await;

    assert_matches!(result, Err(AuthError::EmailTaken));
}

#[tokio::test]
async fn register_validates_before_touching_store() {
    let server = MockServer::start().await;

    let mut request = register_request("ada@example.test");
    request.password = "short".to_string();

    let result = service_for(&server).register(request).await;

    assert_matches!(result, Err(AuthError::Validation(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn login_issues_token_for_valid_credentials() {
    let server = MockServer::start().await;
    let user_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_row(user_id, "ada@example.test", "correct horse battery")
        ])))
        .mount(&server)
        .await;

    let token = service_for(&server)
        .login(LoginRequest {
            email: "ada@example.test".to_string(),
            password: "correct horse battery".to_string(),
        })
        .await
        .unwrap();

    let auth_user = validate_token(&token, TEST_SECRET).unwrap();
    assert_eq!(auth_user.id, user_id.to_string());
    assert!(auth_user.is_patient());
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            user_row(Uuid::new_v4(), "ada@example.test", "correct horse battery")
        ])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .login(LoginRequest {
            email: "ada@example.test".to_string(),
            password: "wrong password".to_string(),
        })
        .await;

    assert_matches!(result, Err(AuthError::InvalidCredentials));
}

#[tokio::test]
async fn login_rejects_unknown_email() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let result = service_for(&server)
        .login(LoginRequest {
            email: "nobody@example.test".to_string(),
            password: "correct horse battery".to_string(),
        })
        .await;

    assert_matches!(result, Err(AuthError::InvalidCredentials));
}
