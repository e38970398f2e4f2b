use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn doctor_routes(config: Arc<AppConfig>) -> Router {
    let protected = Router::new()
        .route("/me", put(handlers::upsert_my_profile))
        .layer(middleware::from_fn_with_state(
            config.clone(),
            auth_middleware,
        ));

    let public = Router::new()
        .route("/", get(handlers::list_doctors))
        .route("/{doctor_id}", get(handlers::get_doctor));

    protected.merge(public).with_state(config)
}
