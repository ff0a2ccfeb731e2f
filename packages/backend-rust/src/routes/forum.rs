use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::Deserialize;
use serde_json::json;

use crate::auth::AuthUser;
use crate::response::{message_only, ok, ok_message, AppError};
use crate::routes::json_body;
use crate::services::forum::{self, NewPost, NewReply, PostFilter, PostUpdate};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(categories))
        .route("/posts", get(list_posts).post(create_post))
        .route(
            "/posts/:id",
            get(get_post).put(update_post).delete(delete_post),
        )
        .route("/posts/:id/comments", post(create_comment))
        .route("/posts/:id/like", post(like_post).delete(unlike_post))
        .route("/comments/:id", put(update_comment).delete(delete_comment))
}

async fn categories(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let categories = forum::categories(state.pool()).await?;
    Ok(ok(json!({ "categories": categories })))
}

async fn list_posts(
    State(state): State<AppState>,
    Query(filter): Query<PostFilter>,
) -> Result<impl IntoResponse, AppError> {
    let (posts, pagination) = forum::list_posts(state.pool(), &filter).await?;
    Ok(ok(json!({
        "posts": posts,
        "pagination": pagination,
    })))
}

async fn create_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<NewPost>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let post = forum::create_post(state.pool(), &caller.id, &caller.role, &input).await?;
    tracing::info!(user_id = %caller.id, post_id = %post.id, "forum post created");
    Ok((
        StatusCode::CREATED,
        ok_message("Post created successfully", post),
    ))
}

async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    Ok(ok(forum::get_post(state.pool(), &id).await?))
}

async fn update_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<PostUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let update = json_body(payload)?;
    let post = forum::update_post(state.pool(), &caller.id, &caller.role, &id, &update).await?;
    Ok(ok_message("Post updated successfully", post))
}

async fn delete_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    forum::delete_post(state.pool(), &caller.id, &caller.role, &id).await?;
    Ok(message_only("Post deleted successfully"))
}

async fn create_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<NewReply>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let input = json_body(payload)?;
    let reply = forum::create_reply(state.pool(), &caller.id, &id, &input).await?;
    Ok((
        StatusCode::CREATED,
        ok_message("Comment added successfully", reply),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct CommentUpdate {
    content: Option<String>,
}

async fn update_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
    payload: Result<Json<CommentUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let reply = forum::update_reply(
        state.pool(),
        &caller.id,
        &caller.role,
        &id,
        body.content.as_deref(),
    )
    .await?;
    Ok(ok_message("Comment updated successfully", reply))
}

async fn delete_comment(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    forum::delete_reply(state.pool(), &caller.id, &caller.role, &id).await?;
    Ok(message_only("Comment deleted successfully"))
}

async fn like_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tally = forum::like_post(state.pool(), &caller.id, &id).await?;
    Ok(ok_message("Post liked successfully", tally))
}

async fn unlike_post(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let tally = forum::unlike_post(state.pool(), &caller.id, &id).await?;
    Ok(ok_message("Like removed successfully", tally))
}
