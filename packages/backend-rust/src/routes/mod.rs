mod admin;
mod assessment;
mod auth;
mod coins;
mod colleges;
mod forum;
mod health;
mod puzzles;
mod users;

use axum::extract::rejection::JsonRejection;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};

use crate::middleware::auth::{require_admin, require_auth};
use crate::middleware::rate_limit::rate_limit_middleware;
use crate::response::AppError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let authed = |routes: Router<AppState>| {
        routes.route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
    };

    let admin_routes = admin::router()
        .route_layer(middleware::from_fn(require_admin))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest(
            "/api/auth",
            auth::public_router().merge(authed(auth::protected_router())),
        )
        .nest("/api/users", authed(users::router()))
        .nest("/api/assessment", authed(assessment::router()))
        .nest("/api/coins", authed(coins::router()))
        .nest("/api/puzzles", authed(puzzles::router()))
        .nest("/api/forum", authed(forum::router()))
        .nest("/api/colleges", authed(colleges::router()))
        .nest("/api/admin", admin_routes)
        .nest("/api/health", health::api_router())
        .nest("/health", health::router())
        .layer(middleware::from_fn(rate_limit_middleware))
        .fallback(fallback_handler)
        .with_state(state)
}

async fn fallback_handler() -> Response {
    AppError::not_found("Route not found").into_response()
}

/// Unwraps a JSON body, turning extractor failures into a 400 `VALIDATION_ERROR`.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::validation(rejection.body_text()))
}

/// Integer path ids; anything else cannot name a row.
pub(crate) fn parse_id(raw: &str, what: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::not_found(format!("{what} not found")))
}
