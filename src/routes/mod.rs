pub mod admin;
pub mod race;

use axum::{response::IntoResponse, response::Response, routing::get, Json, Router};
use http::StatusCode;
use serde_json::json;
use std::{any::Any, error::Error, sync::Arc};
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, Registry};

use crate::{
    models::error::Error as ApiError,
    routes::{admin::admin_routes, race::race_routes},
    utils::{config::Config, state::AppState},
};

fn init_tracing(log_level: &str) {
    let level = match log_level {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let filter = filter::Targets::new()
        .with_target("tower_http::trace::on_response", Level::TRACE)
        .with_target("tower_http::trace::on_request", Level::TRACE)
        .with_target("tower_http::trace::make_span", Level::DEBUG)
        .with_target("axum::rejection", Level::TRACE)
        .with_target(env!("CARGO_CRATE_NAME"), level)
        .with_default(Level::INFO);

    let tracing_layer = tracing_subscriber::fmt::layer();

    Registry::default().with(tracing_layer).with(filter).init();
}

pub async fn make_app() -> Result<(Router, Arc<AppState>), Box<dyn Error>> {
    let config = Config::init()?;
    init_tracing(&config.log_level);

    info!("Initializing application...");
    info!("Configuration loaded successfully");

    let state = Arc::new(AppState::init(config).await?);
    let app = app(state.clone());
    info!("Application initialized successfully");

    Ok((app, state))
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .nest("/races", race_routes(state.clone()))
        .nest("/admin", admin_routes(state.clone()))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Request handler panicked: {}", detail);
    ApiError::internal("Internal server error").into_response()
}
