use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::appointment_routes;
use auth_cell::router::auth_routes;
use doctor_cell::router::doctor_routes;
use payment_cell::router::payment_routes;
use shared_config::AppConfig;

pub fn create_router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(|| async { "Clinic Scheduling API" }))
        .merge(auth_routes(config.clone()))
        .nest("/doctors", doctor_routes(config.clone()))
        .nest("/appointments", appointment_routes(config.clone()))
        .nest("/payment", payment_routes(config))
}
