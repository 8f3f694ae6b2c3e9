use axum::{
    extract::{Request, State},
    middleware::Next,
    response::IntoResponse,
};
use http::{header, StatusCode};
use std::sync::Arc;
use tracing::debug;

use crate::{
    models::{error::Error, jwt::Claims},
    utils::state::AppState,
};

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<impl IntoResponse, Error> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or((StatusCode::UNAUTHORIZED, "Missing Bearer token"))?;

    let claims = state.tokens.verify(token).inspect_err(|e| {
        debug!("Token validation failed: {}", e);
    })?;

    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// Runs after `auth_middleware`; lets only admin tokens through.
pub async fn admin_middleware(req: Request, next: Next) -> Result<impl IntoResponse, Error> {
    let is_admin = req
        .extensions()
        .get::<Claims>()
        .is_some_and(Claims::is_admin);
    if !is_admin {
        return Err((StatusCode::FORBIDDEN, "Admin role required").into());
    }

    Ok(next.run(req).await)
}
