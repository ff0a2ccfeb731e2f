use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Extension, Json, Router};
use chrono::{Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::auth::{self, AuthError, AuthUser, IssuedToken};
use crate::response::{message_only, ok, ok_message, AppError};
use crate::routes::json_body;
use crate::services::otp::{OtpError, OtpKind};
use crate::services::users::{self, NewUser, ProfileUpdate, PublicProfile};
use crate::services::validation::{self, Validator, PASSWORD_RULE};
use crate::services::iso_from;
use crate::state::AppState;

const SELF_SERVICE_ROLES: [&str; 3] = ["student", "teacher", "alumni"];
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/validate-token", post(validate_token))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/change-password", post(change_password))
        .route("/refresh-token", post(refresh_token))
        .route("/profile", get(get_profile).put(update_profile))
        .route("/account", delete(delete_account))
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken => AppError::unauthorized("Access denied. No token provided."),
            AuthError::InvalidToken => AppError::unauthorized("Invalid or expired token"),
            other => AppError::internal(other.to_string()),
        }
    }
}

#[derive(Serialize)]
struct SessionPayload {
    user: PublicProfile,
    token: String,
    expires_at: String,
}

impl SessionPayload {
    fn new(user: PublicProfile, issued: IssuedToken) -> Self {
        Self {
            user,
            token: issued.token,
            expires_at: issued.expires_at,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct RegisterRequest {
    name: Option<String>,
    email: Option<String>,
    password: Option<String>,
    phone: Option<String>,
    role: Option<String>,
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let name = body.name.as_deref().unwrap_or_default().trim();
    let email = body.email.as_deref().unwrap_or_default().trim().to_lowercase();
    let password = body.password.as_deref().unwrap_or_default();
    let phone = body.phone.as_deref().map(str::trim).filter(|p| !p.is_empty());
    let role = body.role.as_deref().unwrap_or("student");

    Validator::new()
        .check(
            validation::char_len_between(name, 2, 50),
            "Name must be between 2 and 50 characters",
        )
        .check(validation::is_valid_email(&email), "Please provide a valid email")
        .check(validation::is_strong_password(password), PASSWORD_RULE)
        .check(
            phone.map_or(true, validation::is_valid_phone),
            "Please provide a valid 10-digit mobile number",
        )
        .check(
            SELF_SERVICE_ROLES.contains(&role),
            "Role must be student, teacher or alumni",
        )
        .finish()?;

    let password_hash = auth::hash_password(password)?;
    let user = users::create(
        state.pool(),
        NewUser {
            email: &email,
            password_hash: &password_hash,
            name,
            phone,
            role,
        },
        state.config().rewards.registration,
    )
    .await?;

    let issued = auth::issue_session(state.pool(), &user.id).await?;

    if let Err(err) = state.email().send_verification_email(&user.email, &user.name).await {
        tracing::warn!(user_id = %user.id, error = %err, "verification email not sent");
    }

    Ok((
        StatusCode::CREATED,
        ok_message(
            "User registered successfully",
            SessionPayload::new(user.public_profile(), issued),
        ),
    ))
}

#[derive(Debug, Default, Deserialize)]
struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let email = body.email.as_deref().unwrap_or_default().trim();
    let password = body.password.as_deref().unwrap_or_default();
    Validator::new()
        .check(validation::is_valid_email(email), "Please provide a valid email")
        .check(!password.is_empty(), "Password is required")
        .finish()?;

    let invalid = || AppError::unauthorized("Invalid email or password");
    let user = users::find_by_email(state.pool(), email)
        .await?
        .ok_or_else(invalid)?;

    if users::is_locked(&user) {
        return Err(AppError::locked(
            "Account temporarily locked. Try again later.",
        ));
    }

    if !auth::verify_password(password, &user.password_hash) {
        users::record_login_failure(state.pool(), &user).await?;
        return Err(invalid());
    }

    match user.account_status.as_str() {
        "suspended" => {
            return Err(AppError::forbidden(
                "Account is suspended. Please contact support.",
            ))
        }
        "inactive" => return Err(AppError::forbidden("Account is inactive")),
        _ => {}
    }

    users::record_login_success(state.pool(), &user.id).await?;
    let issued = auth::issue_session(state.pool(), &user.id).await?;
    let user = users::get(state.pool(), &user.id).await?;
    tracing::info!(user_id = %user.id, "user logged in");

    Ok(ok_message(
        "Login successful",
        SessionPayload::new(user.public_profile(), issued),
    ))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = auth::extract_token(&headers) {
        auth::revoke_session(state.pool(), &token).await?;
    }
    Ok(message_only("Logged out successfully"))
}

#[derive(Debug, Default, Deserialize)]
struct ForgotPasswordRequest {
    email: Option<String>,
}

fn random_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

async fn forgot_password(
    State(state): State<AppState>,
    payload: Result<Json<ForgotPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let email = body.email.as_deref().unwrap_or_default().trim();
    if !validation::is_valid_email(email) {
        return Err(AppError::validation("Please provide a valid email"));
    }

    if let Some(user) = users::find_by_email(state.pool(), email).await? {
        let token = random_token();
        let expires_at = iso_from(Utc::now() + Duration::minutes(RESET_TOKEN_TTL_MINUTES));
        users::store_reset_token(state.pool(), &user.id, &auth::hash_token(&token), &expires_at)
            .await?;
        if let Err(err) = state
            .email()
            .send_password_reset_email(&user.email, &user.name, &token)
            .await
        {
            tracing::warn!(user_id = %user.id, error = %err, "password reset email not sent");
        }
    }

    Ok(message_only(
        "If an account with that email exists, a password reset link has been sent",
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ResetPasswordRequest {
    token: Option<String>,
    password: Option<String>,
}

async fn reset_password(
    State(state): State<AppState>,
    payload: Result<Json<ResetPasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let token = body.token.as_deref().unwrap_or_default().trim();
    let password = body.password.as_deref().unwrap_or_default();
    Validator::new()
        .check(!token.is_empty(), "Reset token is required")
        .check(validation::is_strong_password(password), PASSWORD_RULE)
        .finish()?;

    let user = users::find_by_reset_token(state.pool(), &auth::hash_token(token))
        .await?
        .ok_or_else(|| AppError::bad_request("Invalid or expired reset token"))?;

    let password_hash = auth::hash_password(password)?;
    users::set_password_hash(state.pool(), &user.id, &password_hash).await?;
    let revoked = auth::revoke_user_sessions(state.pool(), &user.id).await?;
    tracing::info!(user_id = %user.id, revoked, "password reset");

    Ok(message_only("Password reset successful"))
}

#[derive(Debug, Default, Deserialize)]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: Option<String>,
}

async fn change_password(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let current = body.current_password.as_deref().unwrap_or_default();
    let new_password = body.new_password.as_deref().unwrap_or_default();
    Validator::new()
        .check(!current.is_empty(), "Current password is required")
        .check(validation::is_strong_password(new_password), PASSWORD_RULE)
        .finish()?;

    let user = users::get(state.pool(), &caller.id).await?;
    if !auth::verify_password(current, &user.password_hash) {
        return Err(AppError::bad_request("Current password is incorrect"));
    }

    let password_hash = auth::hash_password(new_password)?;
    users::set_password_hash(state.pool(), &user.id, &password_hash).await?;
    Ok(message_only("Password changed successfully"))
}

#[derive(Debug, Default, Deserialize)]
struct SendOtpRequest {
    identifier: Option<String>,
    #[serde(rename = "type")]
    kind: Option<OtpKind>,
}

fn check_identifier(kind: OtpKind, identifier: &str) -> Result<(), AppError> {
    let valid = match kind {
        OtpKind::Email => validation::is_valid_email(identifier),
        OtpKind::Phone => validation::is_valid_phone(identifier),
    };
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "Please provide a valid {}",
            kind.as_str()
        )))
    }
}

#[derive(Serialize)]
struct OtpSent {
    identifier: String,
    #[serde(rename = "type")]
    kind: OtpKind,
    expires_in_minutes: u64,
}

async fn send_otp(
    State(state): State<AppState>,
    payload: Result<Json<SendOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let kind = body
        .kind
        .ok_or_else(|| AppError::validation("Type must be email or phone"))?;
    let identifier = body.identifier.as_deref().unwrap_or_default().trim();
    check_identifier(kind, identifier)?;

    let otp = state.otp();
    let code = otp.issue(kind, identifier);
    let expiry_minutes = otp.settings().expiry.as_secs() / 60;

    let delivery = match kind {
        OtpKind::Email => state
            .email()
            .send_otp_email(identifier, &code, expiry_minutes)
            .await
            .map_err(|err| err.to_string()),
        OtpKind::Phone => state
            .sms()
            .send_otp(identifier, &code)
            .await
            .map_err(|err| err.to_string()),
    };
    if let Err(error) = delivery {
        tracing::warn!(kind = kind.as_str(), %error, "OTP delivery failed");
    }

    Ok(ok_message(
        "OTP sent successfully",
        OtpSent {
            identifier: identifier.to_string(),
            kind,
            expires_in_minutes: expiry_minutes,
        },
    ))
}

#[derive(Debug, Default, Deserialize)]
struct VerifyOtpRequest {
    identifier: Option<String>,
    #[serde(rename = "type")]
    kind: Option<OtpKind>,
    otp: Option<String>,
}

#[derive(Serialize)]
struct OtpVerified {
    verified: bool,
    account_updated: bool,
}

async fn verify_otp(
    State(state): State<AppState>,
    payload: Result<Json<VerifyOtpRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let kind = body
        .kind
        .ok_or_else(|| AppError::validation("Type must be email or phone"))?;
    let identifier = body.identifier.as_deref().unwrap_or_default().trim();
    let code = body.otp.as_deref().unwrap_or_default().trim();
    check_identifier(kind, identifier)?;
    if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(AppError::validation("OTP must be 6 digits"));
    }

    state.otp().verify(kind, identifier, code).map_err(|err| match err {
        OtpError::NotFound => AppError::bad_request("OTP not found or expired"),
        OtpError::TooManyAttempts => {
            AppError::too_many_requests("Too many failed attempts. Please request a new OTP.")
        }
        OtpError::Mismatch { remaining } => AppError::bad_request(format!(
            "Invalid OTP. {remaining} attempts remaining"
        )),
    })?;

    let account_updated = users::mark_verified(state.pool(), kind, identifier).await?;
    Ok(ok_message(
        "OTP verified successfully",
        OtpVerified {
            verified: true,
            account_updated,
        },
    ))
}

#[derive(Debug, Default, Deserialize)]
struct ValidateTokenRequest {
    token: Option<String>,
}

#[derive(Serialize)]
struct TokenValidity {
    valid: bool,
    user: PublicProfile,
}

async fn validate_token(
    State(state): State<AppState>,
    payload: Result<Json<ValidateTokenRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let token = body.token.as_deref().unwrap_or_default().trim();
    if token.is_empty() {
        return Err(AppError::validation("Token is required"));
    }

    let caller = auth::verify_request_token(state.pool(), token).await?;
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(TokenValidity {
        valid: true,
        user: user.public_profile(),
    }))
}

async fn refresh_token(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(old) = auth::extract_token(&headers) {
        auth::revoke_session(state.pool(), &old).await?;
    }
    let issued = auth::issue_session(state.pool(), &caller.id).await?;
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok_message(
        "Token refreshed successfully",
        SessionPayload::new(user.public_profile(), issued),
    ))
}

async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = users::get(state.pool(), &caller.id).await?;
    Ok(ok(user.public_profile()))
}

#[derive(Debug, Default, Deserialize)]
struct AccountProfileUpdate {
    name: Option<String>,
    phone: Option<String>,
    college_name: Option<String>,
    course_name: Option<String>,
    admission_year: Option<i64>,
}

async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
    payload: Result<Json<AccountProfileUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let body = json_body(payload)?;
    let update = ProfileUpdate {
        name: body.name,
        phone: body.phone,
        college_name: body.college_name,
        course_name: body.course_name,
        admission_year: body.admission_year,
        ..ProfileUpdate::default()
    };
    let user = users::update_profile(state.pool(), &caller.id, &update).await?;
    Ok(ok_message("Profile updated successfully", user.public_profile()))
}

async fn delete_account(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    users::soft_delete(state.pool(), &caller.id).await?;
    auth::revoke_user_sessions(state.pool(), &caller.id).await?;
    tracing::info!(user_id = %caller.id, "account deleted");
    Ok(message_only("Account deleted successfully"))
}
