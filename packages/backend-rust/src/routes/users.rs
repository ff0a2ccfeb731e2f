use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::AuthUser;
use crate::response::{ok, ok_message, AppError};
use crate::routes::json_body;
use crate::services::users::{
    self, AcademicInfo, CollegeInfo, FamilyInfo, PrivacySettings, ProfileUpdate,
    TOTAL_REGISTRATION_STEPS,
};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registration/status", get(registration_status))
        .route("/registration/step/:step", post(registration_step))
        .route("/registration/complete", post(complete_registration))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/academic", put(update_academic))
        .route("/profile/family", put(update_family))
        .route("/profile/privacy", put(update_privacy))
        .route("/verification/status", get(verification_status))
        .route("/verification/aadhaar", post(verify_aadhaar))
        .route("/dashboard", get(dashboard))
        .route("/statistics", get(statistics))
        .route("/progress", get(progress))
        .route("/achievements", get(achievements))
        .route("/college-info", put(update_college_info))
}

async fn registration_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::registration_status(&user)))
}

fn parse_step(raw: &str) -> Result<i64, AppError> {
    raw.trim()
        .parse::<i64>()
        .ok()
        .filter(|step| (1..=TOTAL_REGISTRATION_STEPS).contains(step))
        .ok_or_else(|| AppError::bad_request("Invalid registration step"))
}

async fn registration_step(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    Path(step): Path<String>,
    payload: Option<Json<Value>>,
) -> Result<impl IntoResponse, AppError> {
    let step = parse_step(&step)?;
    let body = payload
        .map(|Json(value)| value)
        .unwrap_or_else(|| Value::Object(Default::default()));

    let user = users::get(state.pool(), &caller.id).await?;
    let outcome =
        users::update_registration_step(state.pool(), state.cipher(), &user, step, body).await?;
    tracing::debug!(user_id = %caller.id, step, "registration step saved");

    Ok(ok_message(
        format!("Registration step {step} completed"),
        outcome,
    ))
}

async fn complete_registration(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    let user = users::complete_registration(state.pool(), &user).await?;

    if let Err(err) = state.email().send_welcome_email(&user.email, &user.name).await {
        tracing::warn!(user_id = %user.id, error = %err, "welcome email not sent");
    }

    Ok(ok_message(
        "Registration completed successfully",
        user.public_profile(),
    ))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(user))
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let update = json_body(payload)?;
    let user = users::update_profile(state.pool(), &caller.id, &update).await?;
    Ok(ok_message("Profile updated successfully", user))
}

async fn update_academic(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<AcademicInfo>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let info = json_body(payload)?;
    let saved = users::update_academic(state.pool(), &caller.id, &info).await?;
    Ok(ok_message("Academic information updated successfully", saved))
}

async fn update_family(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<FamilyInfo>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let info = json_body(payload)?;
    let saved = users::update_family(state.pool(), &caller.id, &info).await?;
    Ok(ok_message("Family information updated successfully", saved))
}

async fn update_privacy(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<PrivacySettings>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let settings = json_body(payload)?;
    let saved = users::update_privacy(state.pool(), &caller.id, &settings).await?;
    Ok(ok_message("Privacy settings updated successfully", saved))
}

async fn verification_status(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::verification_status(&user)))
}

#[derive(Debug, Default, Deserialize)]
struct AadhaarRequest {
    aadhaar_number: Option<String>,
}

#[derive(Serialize)]
struct AadhaarVerified {
    aadhaar_verified: bool,
    masked_aadhaar: String,
}

async fn verify_aadhaar(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<AadhaarRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let number = body.aadhaar_number.unwrap_or_default();
    let masked = users::verify_aadhaar(state.pool(), state.cipher(), &caller.id, &number).await?;
    Ok(ok_message(
        "Aadhaar verified successfully",
        AadhaarVerified {
            aadhaar_verified: true,
            masked_aadhaar: masked,
        },
    ))
}

async fn dashboard(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::dashboard(state.pool(), &user).await?))
}

async fn statistics(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::statistics(state.pool(), &user).await?))
}

async fn progress(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::progress(&user)))
}

async fn achievements(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(users::achievements(state.pool(), &user).await?))
}

async fn update_college_info(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<CollegeInfo>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let info = json_body(payload)?;
    let user = users::update_college_info(state.pool(), &caller.id, &info).await?;
    Ok(ok_message(
        "College information updated successfully",
        user.public_profile(),
    ))
}
