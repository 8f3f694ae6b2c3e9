use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use http::StatusCode;

use crate::utils::state::AppState;

pub async fn race_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.races.stats()))
}
