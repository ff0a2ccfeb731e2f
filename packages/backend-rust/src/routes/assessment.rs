use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::response::{ok, ok_message, AppError};
use crate::routes::json_body;
use crate::services::assessment;
use crate::services::PageQuery;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/questions", get(questions))
        .route("/start", post(start))
        .route("/submit", post(submit))
        .route("/results", get(latest_result))
        .route("/results/:id", get(result_by_id))
        .route("/history", get(history))
}

async fn questions(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let questions = assessment::active_questions(state.pool()).await?;
    Ok(ok(json!({
        "total": questions.len(),
        "questions": questions,
    })))
}

async fn start(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let outcome = assessment::start(state.pool(), &caller.id).await?;
    if outcome.resumed {
        Ok((
            StatusCode::OK,
            ok_message("Resuming assessment in progress", outcome.assessment),
        ))
    } else {
        tracing::info!(user_id = %caller.id, assessment_id = %outcome.assessment.id, "assessment started");
        Ok((
            StatusCode::CREATED,
            ok_message("Assessment started", outcome.assessment),
        ))
    }
}

async fn submit(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let responses = assessment::validate_responses(body.get("responses"))?;

    let outcome = assessment::submit(
        state.pool(),
        state.scorer(),
        &caller.id,
        &responses,
        state.config().rewards.assessment_completion,
    )
    .await?;
    tracing::info!(
        user_id = %caller.id,
        assessment_id = %outcome.assessment_id,
        responses = responses.len(),
        "assessment completed"
    );

    Ok(ok_message("Assessment completed successfully", outcome))
}

async fn latest_result(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(assessment::latest_result(state.pool(), &caller.id).await?))
}

async fn result_by_id(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(assessment::result_by_id(state.pool(), &caller.id, &id).await?))
}

async fn history(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let (assessments, pagination) = assessment::history(state.pool(), &caller.id, page).await?;
    Ok(ok(json!({
        "assessments": assessments,
        "pagination": pagination,
    })))
}
