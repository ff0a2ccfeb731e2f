use axum::http::{header, HeaderMap};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use sqlx::{Row, SqlitePool};
use thiserror::Error;
use uuid::Uuid;

use crate::services::encryption::sha256_hex;
use crate::services::{iso_from, now_iso};

pub const AUTH_COOKIE_NAME: &str = "auth_token";
const DEFAULT_BCRYPT_ROUNDS: u32 = 12;

type HmacSha256 = Hmac<Sha256>;

/// The caller resolved from a verified token and its live session.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub account_status: String,
}

impl AuthUser {
    pub fn is_suspended(&self) -> bool {
        self.account_status == "suspended"
    }

    pub fn has_role(&self, roles: &[&str]) -> bool {
        roles.contains(&self.role.as_str())
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
    #[error("missing JWT_SECRET")]
    MissingSecret,
    #[error("invalid JWT_EXPIRES_IN")]
    InvalidExpiresIn,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = get_cookie(headers, AUTH_COOKIE_NAME) {
        return Some(token);
    }

    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn get_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(header::COOKIE)?.to_str().ok()?;
    raw.split(';').find_map(|part| {
        let (key, value) = part.trim().split_once('=')?;
        (key == name && !value.is_empty()).then(|| value.to_string())
    })
}

fn jwt_secret() -> Result<String, AuthError> {
    std::env::var("JWT_SECRET")
        .ok()
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingSecret)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: String,
}

pub fn verify_jwt_hs256(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let header_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let payload_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    let sig_b64 = parts.next().ok_or(AuthError::InvalidToken)?;
    if parts.next().is_some() {
        return Err(AuthError::InvalidToken);
    }

    let decode = |segment: &str| {
        URL_SAFE_NO_PAD
            .decode(segment.as_bytes())
            .map_err(|_| AuthError::InvalidToken)
    };
    let header_bytes = decode(header_b64)?;
    let payload_bytes = decode(payload_b64)?;
    let sig_bytes = decode(sig_b64)?;

    let header_json: serde_json::Value =
        serde_json::from_slice(&header_bytes).map_err(|_| AuthError::InvalidToken)?;
    if header_json.get("alg").and_then(|value| value.as_str()) != Some("HS256") {
        return Err(AuthError::InvalidToken);
    }

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(format!("{header_b64}.{payload_b64}").as_bytes());
    mac.verify_slice(&sig_bytes)
        .map_err(|_| AuthError::InvalidToken)?;

    let payload_json: serde_json::Value =
        serde_json::from_slice(&payload_bytes).map_err(|_| AuthError::InvalidToken)?;
    validate_registered_claims(&payload_json)?;

    let user_id = payload_json
        .get("userId")
        .and_then(|value| value.as_str())
        .ok_or(AuthError::InvalidToken)?
        .to_string();

    Ok(Claims { user_id })
}

fn validate_registered_claims(payload: &serde_json::Value) -> Result<(), AuthError> {
    let now = Utc::now().timestamp();

    if let Some(exp) = payload.get("exp").and_then(|value| value.as_i64()) {
        if now >= exp {
            return Err(AuthError::InvalidToken);
        }
    }

    if let Some(nbf) = payload.get("nbf").and_then(|value| value.as_i64()) {
        if now < nbf {
            return Err(AuthError::InvalidToken);
        }
    }

    Ok(())
}

pub fn hash_token(token: &str) -> String {
    sha256_hex(token)
}

pub fn sign_jwt(user_id: &str, secret: &str, ttl_ms: i64) -> Result<(String, DateTime<Utc>), AuthError> {
    let issued_at = Utc::now();
    let exp = issued_at
        .checked_add_signed(chrono::Duration::milliseconds(ttl_ms))
        .ok_or(AuthError::InvalidExpiresIn)?;

    let header_json = serde_json::json!({ "alg": "HS256", "typ": "JWT" });
    // jti keeps two tokens issued in the same second distinct.
    let payload_json = serde_json::json!({
        "userId": user_id,
        "iat": issued_at.timestamp(),
        "exp": exp.timestamp(),
        "jti": Uuid::new_v4().to_string(),
    });

    let header_b64 = URL_SAFE_NO_PAD.encode(header_json.to_string());
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload_json.to_string());
    let signing_input = format!("{header_b64}.{payload_b64}");

    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| AuthError::InvalidToken)?;
    mac.update(signing_input.as_bytes());
    let sig_b64 = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok((format!("{signing_input}.{sig_b64}"), exp))
}

pub fn parse_expires_in_ms(value: &str) -> Result<i64, AuthError> {
    let trimmed = value.trim();
    if trimmed.len() < 2 {
        return Err(AuthError::InvalidExpiresIn);
    }

    let (digits, unit) = trimmed.split_at(trimmed.len() - 1);
    let amount: i64 = digits.parse().map_err(|_| AuthError::InvalidExpiresIn)?;
    if amount <= 0 {
        return Err(AuthError::InvalidExpiresIn);
    }

    match unit {
        "s" => Ok(amount * 1000),
        "m" => Ok(amount * 60 * 1000),
        "h" => Ok(amount * 60 * 60 * 1000),
        "d" => Ok(amount * 24 * 60 * 60 * 1000),
        _ => Err(AuthError::InvalidExpiresIn),
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let rounds = std::env::var("BCRYPT_ROUNDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(DEFAULT_BCRYPT_ROUNDS);
    bcrypt::hash(password, rounds).map_err(|err| AuthError::Hash(err.to_string()))
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: String,
}

/// Signs a token for the user and records its session.
pub async fn issue_session(pool: &SqlitePool, user_id: &str) -> Result<IssuedToken, AuthError> {
    let secret = jwt_secret()?;
    let expires_in = std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| "24h".to_string());
    let (token, expires_at) = sign_jwt(user_id, &secret, parse_expires_in_ms(&expires_in)?)?;
    let expires_at = iso_from(expires_at);

    sqlx::query(
        r#"
        INSERT INTO "sessions" ("id", "user_id", "token_hash", "expires_at", "created_at")
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(hash_token(&token))
    .bind(&expires_at)
    .bind(now_iso())
    .execute(pool)
    .await?;

    Ok(IssuedToken { token, expires_at })
}

pub async fn verify_request_token(pool: &SqlitePool, token: &str) -> Result<AuthUser, AuthError> {
    let claims = verify_jwt_hs256(token, &jwt_secret()?)?;

    let session = sqlx::query(r#"SELECT "user_id", "expires_at" FROM "sessions" WHERE "token_hash" = ?"#)
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidToken)?;
    let session_user: String = session.try_get("user_id")?;
    let expires_at: String = session.try_get("expires_at")?;
    // Both sides are RFC 3339 UTC with millis, so text order is time order.
    if session_user != claims.user_id || expires_at <= now_iso() {
        return Err(AuthError::InvalidToken);
    }

    let row = sqlx::query(
        r#"SELECT "id", "email", "name", "role", "account_status" FROM "users" WHERE "id" = ?"#,
    )
    .bind(&claims.user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(AuthError::InvalidToken)?;

    let user = AuthUser {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        role: row.try_get("role")?,
        account_status: row.try_get("account_status")?,
    };
    if user.account_status == "inactive" {
        return Err(AuthError::InvalidToken);
    }
    Ok(user)
}

pub async fn revoke_session(pool: &SqlitePool, token: &str) -> Result<(), AuthError> {
    sqlx::query(r#"DELETE FROM "sessions" WHERE "token_hash" = ?"#)
        .bind(hash_token(token))
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn revoke_user_sessions(pool: &SqlitePool, user_id: &str) -> Result<u64, AuthError> {
    let result = sqlx::query(r#"DELETE FROM "sessions" WHERE "user_id" = ?"#)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

pub async fn purge_expired_sessions(pool: &SqlitePool) -> Result<u64, AuthError> {
    let result = sqlx::query(r#"DELETE FROM "sessions" WHERE "expires_at" <= ?"#)
        .bind(now_iso())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
