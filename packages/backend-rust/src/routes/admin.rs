use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::{self, AuthUser};
use crate::response::{message_only, ok, ok_message, AppError};
use crate::routes::{json_body, parse_id};
use crate::services::admin::{
    self, AnalyticsPeriod, CoinAdjustment, CollegeInput, ModerationAction, ModerationFilter,
    UserFilter, UserUpdate,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(user_detail).put(update_user).delete(delete_user),
        )
        .route("/colleges", post(create_college))
        .route("/colleges/:id", put(update_college).delete(delete_college))
        .route("/forum/posts", get(moderation_queue))
        .route("/forum/posts/:id/moderate", put(moderate_post))
        .route("/analytics", get(analytics))
        .route("/reports", get(reports))
        .route("/coins/adjust", post(adjust_coins))
}

async fn list_users(
    State(state): State<AppState>,
    Query(filter): Query<UserFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (users, pagination) = admin::list_users(state.pool(), &filter).await?;
    Ok(ok(json!({
        "users": users,
        "pagination": pagination,
    })))
}

async fn user_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(admin::user_detail(state.pool(), &id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<UserUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let update = json_body(payload)?;
    let user = admin::update_user(state.pool(), &caller.id, &id, &update).await?;
    Ok(ok_message("User updated successfully", user))
}

async fn delete_user(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    admin::deactivate_user(state.pool(), &caller.id, &id).await?;
    let revoked = auth::revoke_user_sessions(state.pool(), &id).await?;
    tracing::debug!(user_id = %id, revoked, "sessions revoked after deactivation");
    Ok(message_only("User deleted successfully"))
}

async fn create_college(
    State(state): State<AppState>,
    payload: Result<Json<CollegeInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let college = admin::create_college(state.pool(), &input).await?;
    Ok((
        StatusCode::CREATED,
        ok_message("College created successfully", college),
    ))
}

async fn update_college(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<CollegeInput>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "College")?;
    let input = json_body(payload)?;
    let college = admin::update_college(state.pool(), id, &input).await?;
    Ok(ok_message("College updated successfully", college))
}

async fn delete_college(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = parse_id(&id, "College")?;
    admin::deactivate_college(state.pool(), id).await?;
    Ok(message_only("College deleted successfully"))
}

async fn moderation_queue(
    State(state): State<AppState>,
    Query(filter): Query<ModerationFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (posts, pagination) = admin::moderation_queue(state.pool(), &filter).await?;
    Ok(ok(json!({
        "posts": posts,
        "pagination": pagination,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct ModerationRequest {
    action: Option<String>,
    reason: Option<String>,
}

async fn moderate_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<ModerationRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let action = ModerationAction::parse(body.action.as_deref())?;
    let outcome = admin::moderate_post(
        state.pool(),
        &caller.id,
        &id,
        action,
        body.reason.as_deref(),
    )
    .await?;
    Ok(ok_message("Post moderated successfully", outcome))
}

#[derive(Debug, Default, Deserialize)]
struct AnalyticsQuery {
    period: Option<String>,
}

async fn analytics(
    State(state): State<AppState>,
    Query(query): Query<AnalyticsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = AnalyticsPeriod::parse(query.period.as_deref())?;
    Ok(ok(admin::analytics(state.pool(), period).await?))
}

async fn reports(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    Ok(ok(admin::reports(state.pool()).await?))
}

async fn adjust_coins(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CoinAdjustment>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let transaction = admin::adjust_coins(state.pool(), &caller.id, &input).await?;
    Ok(ok_message("Coins adjusted successfully", transaction))
}
