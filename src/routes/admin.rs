use std::sync::Arc;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};

use crate::{
    handlers::{
        admin::race_stats,
        middleware::{admin_middleware, auth_middleware},
    },
    utils::state::AppState,
};

pub fn admin_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/race-stats", get(race_stats))
        .route_layer(from_fn(admin_middleware))
        .route_layer(from_fn_with_state(state, auth_middleware))
}
