pub mod admin;
pub mod assessment;
pub mod coins;
pub mod colleges;
pub mod email_provider;
pub mod encryption;
pub mod forum;
pub mod otp;
pub mod puzzles;
pub mod sms;
pub mod users;
pub mod validation;

use axum::http::StatusCode;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::response::{json_error, AppError};

/// Error shared by the domain services. Routes convert it with `?`.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("locked: {0}")]
    Locked(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error("internal: {0}")]
    Internal(String),
    /// Failure the client is allowed to see, answered with 500.
    #[error("processing failed: {0}")]
    Processing(String),
}

impl ServiceError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => AppError::validation(message),
            ServiceError::BadRequest(message) => AppError::bad_request(message),
            ServiceError::NotFound(message) => AppError::not_found(message),
            ServiceError::Conflict(message) => AppError::conflict(message),
            ServiceError::Forbidden(message) => AppError::forbidden(message),
            ServiceError::Unauthorized(message) => AppError::unauthorized(message),
            ServiceError::Locked(message) => AppError::locked(message),
            ServiceError::Sql(err) => AppError::internal(format!("database error: {err}")),
            ServiceError::Internal(message) => AppError::internal(message),
            ServiceError::Processing(message) => json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "PROCESSING_ERROR",
                message,
            ),
        }
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn iso_from(value: chrono::DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// `?page&limit` query parameters. Missing or out-of-range values are normalised.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PageQuery {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn offset(&self) -> i64 {
        (self.page() - 1) * self.limit()
    }

    pub fn info(&self, total: i64) -> PageInfo {
        PageInfo::new(total, self.page(), self.limit())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl PageInfo {
    pub fn new(total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            total,
            page,
            limit,
            total_pages,
        }
    }
}

/// Decodes a JSON text column, falling back to `Default` on malformed data.
pub(crate) fn json_column<T: serde::de::DeserializeOwned + Default>(raw: Option<String>) -> T {
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_query_defaults_and_clamps() {
        let q = PageQuery::default();
        assert_eq!((q.page(), q.limit(), q.offset()), (1, 20, 0));

        let q = PageQuery {
            page: Some(3),
            limit: Some(500),
        };
        assert_eq!((q.page(), q.limit(), q.offset()), (3, 100, 200));

        let q = PageQuery {
            page: Some(-2),
            limit: Some(0),
        };
        assert_eq!((q.page(), q.limit()), (1, 1));
    }

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(PageInfo::new(41, 1, 20).total_pages, 3);
        assert_eq!(PageInfo::new(40, 1, 20).total_pages, 2);
        assert_eq!(PageInfo::new(0, 1, 20).total_pages, 0);
    }

    #[test]
    fn test_json_column_fallback() {
        let tags: Vec<String> = json_column(Some(r#"["a","b"]"#.to_string()));
        assert_eq!(tags, vec!["a", "b"]);
        let broken: Vec<String> = json_column(Some("not json".to_string()));
        assert!(broken.is_empty());
        let missing: Vec<String> = json_column(None);
        assert!(missing.is_empty());
    }
}
