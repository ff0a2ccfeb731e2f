use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::response::{ok, ok_message, AppError};
use crate::routes::json_body;
use crate::services::puzzles::{self, AttemptRequest, LeaderboardPeriod};
use crate::services::PageQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/daily", get(daily))
        .route("/attempt", post(attempt))
        .route("/history", get(history))
        .route("/leaderboard", get(leaderboard))
        .route("/categories", get(categories))
        .route("/courses", get(courses))
}

async fn daily(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let puzzle = puzzles::daily(state.pool(), &caller.id, puzzles::today()).await?;
    Ok(ok(puzzle))
}

async fn attempt(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<AttemptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = json_body(payload)?;
    let outcome = puzzles::attempt(state.pool(), &state.config().rewards, &caller.id, &request).await?;
    let message = if outcome.is_correct {
        "Correct answer!"
    } else {
        "Incorrect answer. Better luck next time!"
    };
    Ok(ok_message(message, outcome))
}

async fn history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (attempts, pagination) = puzzles::history(state.pool(), &caller.id, page).await?;
    Ok(ok(json!({
        "attempts": attempts,
        "pagination": pagination,
    })))
}

#[derive(Debug, Default, Deserialize)]
struct LeaderboardQuery {
    period: Option<String>,
    limit: Option<i64>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<impl IntoResponse, AppError> {
    let period = LeaderboardPeriod::parse(query.period.as_deref())?;
    let entries = puzzles::leaderboard(state.pool(), period, query.limit).await?;
    Ok(ok(json!({
        "period": period,
        "leaderboard": entries,
    })))
}

async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let categories = puzzles::categories(state.pool()).await?;
    Ok(ok(json!({ "categories": categories })))
}

async fn courses(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let courses = puzzles::courses(state.pool()).await?;
    Ok(ok(json!({ "courses": courses })))
}
