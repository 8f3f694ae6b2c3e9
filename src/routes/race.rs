use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::{
    handlers::{
        middleware::auth_middleware,
        race::{
            cancel_race, create_realtime_race, finish_race, get_race, join_race, leave_race,
            list_active_races, ready_race, start_race,
        },
    },
    utils::state::AppState,
};

pub fn race_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let protected = Router::new()
        .route("/create-realtime", post(create_realtime_race))
        .route("/{race_id}", get(get_race))
        .route("/{race_id}/join", post(join_race))
        .route("/{race_id}/leave", post(leave_race))
        .route("/{race_id}/ready", post(ready_race))
        .route("/{race_id}/start", post(start_race))
        .route("/{race_id}/finish", post(finish_race))
        .route("/{race_id}/cancel", post(cancel_race))
        .route_layer(from_fn_with_state(state, auth_middleware));

    Router::new()
        .route("/active", get(list_active_races))
        .merge(protected)
}
