use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::IntoResponse,
    Extension, Json,
};
use http::StatusCode;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    models::{
        error::{Error, RaceError},
        jwt::Claims,
        race_session::{Actor, RaceConfig, RaceSession},
        request::CreateRaceRequest,
    },
    realtime::{
        manager::Outcome,
        snapshot::{project, Audience},
    },
    utils::state::AppState,
};

fn parse_race_id(raw: &str) -> Result<Uuid, RaceError> {
    Uuid::parse_str(raw).map_err(|_| RaceError::NotFound(raw.to_string()))
}

fn snapshot_for(session: &RaceSession, actor: &Actor) -> Value {
    let snapshot = project(session, Audience::resolve(session, Some(actor)));
    json!(snapshot)
}

fn outcome_body<T>(outcome: &Outcome<T>, actor: &Actor) -> Value {
    json!({
        "success": true,
        "snapshot": snapshot_for(&outcome.session, actor),
        "persisted": outcome.persisted,
    })
}

pub async fn create_realtime_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CreateRaceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, Error> {
    let Json(payload) = payload?;
    let config = RaceConfig::try_from(payload)?;
    let outcome = state.races.create(&claims.actor(), config).await?;
    let race_id = outcome.session.id;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "raceId": race_id,
            "websocketUrl": state.websocket_url(race_id),
            "persisted": outcome.persisted,
        })),
    ))
}

pub async fn list_active_races(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.races.list_public()))
}

pub async fn get_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let snapshot = state.races.snapshot(race_id, Some(&claims.actor()))?;
    Ok((StatusCode::OK, Json(snapshot)))
}

pub async fn join_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.join(race_id, &actor).await?;

    let mut body = outcome_body(&outcome, &actor);
    body["participant"] = json!(outcome.value);
    Ok((StatusCode::OK, Json(body)))
}

pub async fn leave_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.leave(race_id, &actor).await?;
    Ok((StatusCode::OK, Json(outcome_body(&outcome, &actor))))
}

pub async fn ready_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.ready(race_id, &actor).await?;
    Ok((StatusCode::OK, Json(outcome_body(&outcome, &actor))))
}

pub async fn start_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.start(race_id, &actor).await?;
    Ok((StatusCode::OK, Json(outcome_body(&outcome, &actor))))
}

pub async fn finish_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.finish(race_id, &actor).await?;
    Ok((StatusCode::OK, Json(outcome_body(&outcome, &actor))))
}

pub async fn cancel_race(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<Claims>,
    Path(race_id): Path<String>,
) -> Result<impl IntoResponse, Error> {
    let race_id = parse_race_id(&race_id)?;
    let actor = claims.actor();
    let outcome = state.races.cancel(race_id, &actor).await?;
    Ok((StatusCode::OK, Json(outcome_body(&outcome, &actor))))
}
