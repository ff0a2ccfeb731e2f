use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::{self, AuthError, AuthUser};
use crate::response::AppError;
use crate::state::AppState;

pub const ADMIN_ROLES: &[&str] = &["college_administrator"];

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = auth::extract_token(req.headers()) else {
        return AppError::unauthorized("Access denied. No token provided.").into_response();
    };

    match auth::verify_request_token(state.pool(), &token).await {
        Ok(user) if user.is_suspended() => {
            AppError::forbidden("Account is suspended. Please contact support.").into_response()
        }
        Ok(user) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(AuthError::Database(err)) => {
            AppError::internal(format!("session lookup failed: {err}")).into_response()
        }
        Err(AuthError::MissingSecret) => {
            AppError::internal("JWT_SECRET is not configured").into_response()
        }
        Err(err) => {
            tracing::debug!(error = %err, "token rejected");
            AppError::unauthorized("Invalid or expired token").into_response()
        }
    }
}

/// Runs after [`require_auth`]; rejects callers whose role is not listed.
pub async fn require_role(
    roles: &'static [&'static str],
    req: Request<Body>,
    next: Next,
) -> Response {
    let allowed = req
        .extensions()
        .get::<AuthUser>()
        .is_some_and(|user| user.has_role(roles));
    if !allowed {
        return AppError::forbidden("Access denied. Insufficient permissions.").into_response();
    }
    next.run(req).await
}

pub async fn require_admin(req: Request<Body>, next: Next) -> Response {
    require_role(ADMIN_ROLES, req, next).await
}
