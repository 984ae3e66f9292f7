use std::sync::Arc;

use axum::{routing::get, Router};

use client_cell::router::client_routes;
use plan_cell::router::plan_routes;
use scheduling_cell::router::appointment_routes;
use shared_database::AppState;
use specialist_cell::router::specialist_routes;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Scheduling API is running!" }))
        .nest("/appointments", appointment_routes(state.clone()))
        .nest("/specialists", specialist_routes(state.clone()))
        .nest("/plans", plan_routes(state.clone()))
        .nest("/clients", client_routes(state))
}
