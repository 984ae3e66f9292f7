use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn specialist_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_specialists))
        .route("/", post(handlers::create_specialist))
        .route("/{specialist_id}", get(handlers::get_specialist))
        .route("/{specialist_id}", put(handlers::update_specialist))
        .route("/{specialist_id}", delete(handlers::delete_specialist))
        .route("/{specialist_id}/plans", get(handlers::list_accepted_plans))
        .route("/{specialist_id}/plans", post(handlers::accept_plan))
        .route("/{specialist_id}/plans/{plan_id}", delete(handlers::remove_plan))
        .route("/{specialist_id}/policies", get(handlers::list_policies))
        .route("/{specialist_id}/policies", put(handlers::upsert_policy))
        .route("/{specialist_id}/policies/{plan_id}", delete(handlers::delete_policy))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
