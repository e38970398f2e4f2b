use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware,
    routing::get,
    Extension, Router,
};
use shared_models::auth::AuthUser;
use shared_utils::extractor::auth_middleware;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};
use tower::ServiceExt;

async fn whoami(Extension(user): Extension<AuthUser>) -> String {
    user.id
}

fn app(config: &TestConfig) -> Router {
    let state = config.to_arc();
    Router::new()
        .route("/whoami", get(whoami))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}

fn get_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/whoami");
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn valid_token_reaches_handler_with_identity() {
    let config = TestConfig::default();
    let user = TestUser::patient("ada@example.test");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret, None);

    let response = app(&config).oneshot(get_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(body, user.id.as_bytes());
}

#[tokio::test]
async fn missing_header_is_unauthorized() {
    let config = TestConfig::default();

    let response = app(&config).oneshot(get_request(None)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_unauthorized() {
    let config = TestConfig::default();
    let user = TestUser::doctor("brandt@example.test");
    let token = JwtTestUtils::create_expired_token(&user, &config.jwt_secret);

    let response = app(&config).oneshot(get_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forged_signature_is_unauthorized() {
    let config = TestConfig::default();
    let user = TestUser::patient("mallory@example.test");
    let token = JwtTestUtils::create_invalid_signature_token(&user);

    let response = app(&config).oneshot(get_request(Some(&token))).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
