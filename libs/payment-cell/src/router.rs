use std::sync::Arc;

use axum::{middleware, routing::post, Router};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::record_payment))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ))
        .with_state(config)
}
