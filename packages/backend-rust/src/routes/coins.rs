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
use crate::services::coins::{self, TransactionFilter, REWARDS};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/balance", get(balance))
        .route("/transactions", get(transactions))
        .route("/rewards", get(rewards))
        .route("/redeem", post(redeem))
        .route("/redemptions", get(redemptions))
}

async fn balance(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(coins::balance(state.pool(), &caller.id).await?))
}

async fn transactions(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Query(filter): Query<TransactionFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (transactions, pagination) =
        coins::list_transactions(state.pool(), &caller.id, &filter).await?;
    Ok(ok(json!({
        "transactions": transactions,
        "pagination": pagination,
    })))
}

async fn rewards() -> impl IntoResponse {
    ok(json!({ "rewards": REWARDS }))
}

#[derive(Debug, Default, Deserialize)]
struct RedeemRequest {
    reward_id: Option<String>,
}

async fn redeem(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<RedeemRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let reward_id = body
        .reward_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::validation("Reward id is required"))?;

    let outcome = coins::redeem(state.pool(), &caller.id, reward_id).await?;
    tracing::info!(
        user_id = %caller.id,
        reward_id,
        new_balance = outcome.new_balance,
        "reward redeemed"
    );
    Ok(ok_message("Reward redeemed successfully", outcome))
}

async fn redemptions(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let redemptions = coins::redemptions(state.pool(), &caller.id).await?;
    Ok(ok(json!({ "redemptions": redemptions })))
}
