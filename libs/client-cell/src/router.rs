use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};

use shared_database::AppState;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn client_routes(state: Arc<AppState>) -> Router {
    let protected_routes = Router::new()
        .route("/", get(handlers::list_clients))
        .route("/", post(handlers::create_client))
        .route("/{client_id}", get(handlers::get_client))
        .route("/{client_id}", put(handlers::update_client))
        .route("/{client_id}", delete(handlers::delete_client))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
