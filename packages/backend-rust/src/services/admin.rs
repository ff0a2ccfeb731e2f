use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};

use crate::services::assessment::{self, AssessmentSummary};
use crate::services::coins::{self, CoinBalance, CoinEntry, CoinSource, CoinTransaction, TransactionType};
use crate::services::colleges::{self, College, COLLEGE_TYPES};
use crate::services::forum::{self, Post};
use crate::services::users::{self, PublicProfile, ACCOUNT_STATUSES, ROLES};
use crate::services::validation::{char_len_between, Validator};
use crate::services::{iso_from, now_iso, PageInfo, PageQuery, ServiceError};

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserFilter {
    pub role: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl UserFilter {
    fn validate(&self) -> Result<(), ServiceError> {
        Validator::new()
            .check(
                self.role.as_deref().map_or(true, |r| ROLES.contains(&r)),
                "Invalid role filter",
            )
            .check(
                self.status
                    .as_deref()
                    .map_or(true, |s| ACCOUNT_STATUSES.contains(&s)),
                "Invalid status filter",
            )
            .finish()
    }

    fn push_filters<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        if let Some(role) = self.role.as_deref() {
            qb.push(r#" AND "role" = "#).push_bind(role);
        }
        if let Some(status) = self.status.as_deref() {
            qb.push(r#" AND "account_status" = "#).push_bind(status);
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{search}%");
            qb.push(r#" AND ("name" LIKE "#)
                .push_bind(pattern.clone())
                .push(r#" OR "email" LIKE "#)
                .push_bind(pattern.clone())
                .push(r#" OR "phone" LIKE "#)
                .push_bind(pattern)
                .push(")");
        }
        // Dates compare on the YYYY-MM-DD prefix so both bounds are inclusive.
        if let Some(from) = self.date_from.as_deref() {
            qb.push(r#" AND substr("created_at", 1, 10) >= "#).push_bind(from);
        }
        if let Some(to) = self.date_to.as_deref() {
            qb.push(r#" AND substr("created_at", 1, 10) <= "#).push_bind(to);
        }
    }
}

pub async fn list_users(
    pool: &SqlitePool,
    filter: &UserFilter,
) -> Result<(Vec<PublicProfile>, PageInfo), ServiceError> {
    filter.validate()?;
    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    };

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT COUNT(*) FROM "users""#);
    filter.push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT * FROM "users""#);
    filter.push_filters(&mut qb);
    qb.push(r#" ORDER BY "created_at" DESC LIMIT "#)
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(users::map_user_row(row)?.public_profile());
    }
    Ok((items, page.info(total)))
}

#[derive(Debug, Clone, Serialize)]
pub struct UserDetail {
    pub user: PublicProfile,
    pub coins: CoinBalance,
    pub assessments: Vec<AssessmentSummary>,
}

pub async fn user_detail(pool: &SqlitePool, user_id: &str) -> Result<UserDetail, ServiceError> {
    let user = users::get(pool, user_id).await?;
    let coins = coins::balance(pool, user_id).await?;
    let (assessments, _) = assessment::history(
        pool,
        user_id,
        PageQuery {
            page: Some(1),
            limit: Some(5),
        },
    )
    .await?;
    Ok(UserDetail {
        user: user.public_profile(),
        coins,
        assessments,
    })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub account_status: Option<String>,
    pub role: Option<String>,
    pub reason: Option<String>,
}

pub async fn update_user(
    pool: &SqlitePool,
    admin_id: &str,
    user_id: &str,
    update: &UserUpdate,
) -> Result<PublicProfile, ServiceError> {
    Validator::new()
        .check(
            update.account_status.is_some() || update.role.is_some(),
            "Nothing to update",
        )
        .check(
            update
                .account_status
                .as_deref()
                .map_or(true, |s| ACCOUNT_STATUSES.contains(&s)),
            "Invalid account status",
        )
        .check(
            update.role.as_deref().map_or(true, |r| ROLES.contains(&r)),
            "Invalid role",
        )
        .finish()?;

    let before = users::get(pool, user_id).await?;
    sqlx::query(
        r#"
        UPDATE "users"
        SET "account_status" = COALESCE(?, "account_status"), "role" = COALESCE(?, "role"), "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&update.account_status)
    .bind(&update.role)
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;

    tracing::info!(
        admin_id,
        user_id,
        old_status = %before.account_status,
        new_status = ?update.account_status,
        old_role = %before.role,
        new_role = ?update.role,
        reason = update.reason.as_deref().unwrap_or("none"),
        "admin updated user"
    );
    Ok(users::get(pool, user_id).await?.public_profile())
}

pub async fn deactivate_user(
    pool: &SqlitePool,
    admin_id: &str,
    user_id: &str,
) -> Result<(), ServiceError> {
    if admin_id == user_id {
        return Err(ServiceError::bad_request("You cannot delete your own account"));
    }
    let result = sqlx::query(
        r#"UPDATE "users" SET "account_status" = 'inactive', "updated_at" = ? WHERE "id" = ?"#,
    )
    .bind(now_iso())
    .bind(user_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("User not found"));
    }
    tracing::info!(admin_id, user_id, "admin deactivated user");
    Ok(())
}

// ---------------------------------------------------------------------------
// Colleges
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CollegeInput {
    pub name: Option<String>,
    pub code: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub nirf_ranking: Option<i64>,
    pub accreditation: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub facilities: Option<Vec<String>>,
}

impl CollegeInput {
    /// `partial` skips the required-field checks for updates.
    fn validate(&self, partial: bool) -> Result<(), ServiceError> {
        let present = |value: &Option<String>, max: usize| match value.as_deref() {
            Some(v) => char_len_between(v, 1, max),
            None => partial,
        };
        Validator::new()
            .check(present(&self.name, 200), "Name is required (max 200 characters)")
            .check(present(&self.code, 20), "Code is required (max 20 characters)")
            .check(present(&self.city, 100), "City is required")
            .check(present(&self.state, 100), "State is required")
            .check(
                match self.kind.as_deref() {
                    Some(kind) => COLLEGE_TYPES.contains(&kind),
                    None => partial,
                },
                "Type must be government, private, deemed or autonomous",
            )
            .check(
                self.nirf_ranking.map_or(true, |r| r > 0),
                "NIRF ranking must be positive",
            )
            .finish()
    }

    fn facilities_json(&self) -> Result<Option<String>, ServiceError> {
        self.facilities
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|err| ServiceError::Internal(format!("failed to encode facilities: {err}")))
    }
}

async fn code_taken(pool: &SqlitePool, code: &str, except: Option<i64>) -> Result<bool, ServiceError> {
    let found: Option<i64> = sqlx::query_scalar(r#"SELECT "id" FROM "colleges" WHERE "code" = ?"#)
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(matches!(found, Some(id) if Some(id) != except))
}

async fn load_college(pool: &SqlitePool, college_id: i64) -> Result<College, ServiceError> {
    let row = sqlx::query(r#"SELECT * FROM "colleges" WHERE "id" = ?"#)
        .bind(college_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("College not found"))?;
    Ok(colleges::map_college(&row)?)
}

pub async fn create_college(pool: &SqlitePool, input: &CollegeInput) -> Result<College, ServiceError> {
    input.validate(false)?;
    let code = input.code.as_deref().unwrap_or_default().trim();
    if code_taken(pool, code, None).await? {
        return Err(ServiceError::Conflict("College code already exists".into()));
    }

    let now = now_iso();
    let facilities = input.facilities_json()?.unwrap_or_else(|| "[]".to_string());
    let result = sqlx::query(
        r#"
        INSERT INTO "colleges"
          ("name", "code", "type", "location", "city", "state", "nirf_ranking", "accreditation",
           "website", "description", "facilities", "active", "created_at", "updated_at")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(input.name.as_deref().map(str::trim))
    .bind(code)
    .bind(&input.kind)
    .bind(&input.location)
    .bind(input.city.as_deref().map(str::trim))
    .bind(input.state.as_deref().map(str::trim))
    .bind(input.nirf_ranking)
    .bind(&input.accreditation)
    .bind(&input.website)
    .bind(&input.description)
    .bind(facilities)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();
    tracing::info!(college_id = id, code, "college created");
    load_college(pool, id).await
}

pub async fn update_college(
    pool: &SqlitePool,
    college_id: i64,
    input: &CollegeInput,
) -> Result<College, ServiceError> {
    input.validate(true)?;
    load_college(pool, college_id).await?;
    let code = input.code.as_deref().map(str::trim);
    if let Some(code) = code {
        if code_taken(pool, code, Some(college_id)).await? {
            return Err(ServiceError::Conflict("College code already exists".into()));
        }
    }

    sqlx::query(
        r#"
        UPDATE "colleges" SET
          "name" = COALESCE(?, "name"),
          "code" = COALESCE(?, "code"),
          "type" = COALESCE(?, "type"),
          "location" = COALESCE(?, "location"),
          "city" = COALESCE(?, "city"),
          "state" = COALESCE(?, "state"),
          "nirf_ranking" = COALESCE(?, "nirf_ranking"),
          "accreditation" = COALESCE(?, "accreditation"),
          "website" = COALESCE(?, "website"),
          "description" = COALESCE(?, "description"),
          "facilities" = COALESCE(?, "facilities"),
          "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(input.name.as_deref().map(str::trim))
    .bind(code)
    .bind(&input.kind)
    .bind(&input.location)
    .bind(input.city.as_deref().map(str::trim))
    .bind(input.state.as_deref().map(str::trim))
    .bind(input.nirf_ranking)
    .bind(&input.accreditation)
    .bind(&input.website)
    .bind(&input.description)
    .bind(input.facilities_json()?)
    .bind(now_iso())
    .bind(college_id)
    .execute(pool)
    .await?;

    load_college(pool, college_id).await
}

pub async fn deactivate_college(pool: &SqlitePool, college_id: i64) -> Result<(), ServiceError> {
    let result =
        sqlx::query(r#"UPDATE "colleges" SET "active" = 0, "updated_at" = ? WHERE "id" = ?"#)
            .bind(now_iso())
            .bind(college_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("College not found"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Forum moderation
// ---------------------------------------------------------------------------

pub const POST_STATUSES: [&str; 3] = ["active", "flagged", "deleted"];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModerationFilter {
    pub status: Option<String>,
    pub category_id: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn moderation_queue(
    pool: &SqlitePool,
    filter: &ModerationFilter,
) -> Result<(Vec<Post>, PageInfo), ServiceError> {
    if let Some(status) = filter.status.as_deref() {
        if !POST_STATUSES.contains(&status) {
            return Err(ServiceError::validation("Status must be active, flagged or deleted"));
        }
    }
    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    };

    let push_filters = |qb: &mut QueryBuilder<'_, Sqlite>| {
        qb.push(" WHERE 1 = 1");
        if let Some(status) = filter.status.clone() {
            qb.push(r#" AND p."status" = "#).push_bind(status);
        }
        if let Some(category_id) = filter.category_id {
            qb.push(r#" AND p."category_id" = "#).push_bind(category_id);
        }
    };

    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(r#"SELECT COUNT(*) FROM "forum_posts" p"#);
    push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(forum::POST_SELECT);
    push_filters(&mut qb);
    qb.push(r#" ORDER BY p."created_at" DESC LIMIT "#)
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let posts = rows.iter().map(forum::map_post).collect::<Result<Vec<_>, _>>()?;
    Ok((posts, page.info(total)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Flag,
    Delete,
}

impl ModerationAction {
    pub fn parse(value: Option<&str>) -> Result<Self, ServiceError> {
        match value {
            Some("approve") => Ok(Self::Approve),
            Some("flag") => Ok(Self::Flag),
            Some("delete") => Ok(Self::Delete),
            _ => Err(ServiceError::bad_request("Invalid moderation action")),
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Approve => "active",
            Self::Flag => "flagged",
            Self::Delete => "deleted",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModerationOutcome {
    pub post_id: String,
    pub new_status: &'static str,
}

pub async fn moderate_post(
    pool: &SqlitePool,
    admin_id: &str,
    post_id: &str,
    action: ModerationAction,
    reason: Option<&str>,
) -> Result<ModerationOutcome, ServiceError> {
    let result = sqlx::query(
        r#"
        UPDATE "forum_posts"
        SET "status" = ?, "moderation_reason" = ?, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(action.status())
    .bind(reason)
    .bind(now_iso())
    .bind(post_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("Post not found"));
    }

    tracing::info!(admin_id, post_id, status = action.status(), "post moderated");
    Ok(ModerationOutcome {
        post_id: post_id.to_string(),
        new_status: action.status(),
    })
}

// ---------------------------------------------------------------------------
// Analytics and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyticsPeriod {
    Week,
    Month,
    Quarter,
}

impl AnalyticsPeriod {
    pub fn parse(value: Option<&str>) -> Result<Self, ServiceError> {
        match value.unwrap_or("30d") {
            "7d" => Ok(Self::Week),
            "30d" => Ok(Self::Month),
            "90d" => Ok(Self::Quarter),
            _ => Err(ServiceError::validation("Period must be 7d, 30d or 90d")),
        }
    }

    pub fn days(&self) -> i64 {
        match self {
            Self::Week => 7,
            Self::Month => 30,
            Self::Quarter => 90,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Week => "7d",
            Self::Month => "30d",
            Self::Quarter => "90d",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: String,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub period: &'static str,
    pub since: String,
    pub new_users: Vec<DailyCount>,
    pub completed_assessments: Vec<DailyCount>,
    pub puzzle_attempts: Vec<DailyCount>,
    pub forum_posts: Vec<DailyCount>,
}

async fn daily_counts(
    pool: &SqlitePool,
    table: &str,
    date_column: &str,
    extra: &str,
    since: &str,
) -> Result<Vec<DailyCount>, ServiceError> {
    let sql = format!(
        r#"
        SELECT substr("{date_column}", 1, 10) AS "day", COUNT(*) AS "count"
        FROM "{table}"
        WHERE "{date_column}" >= ? {extra}
        GROUP BY "day"
        ORDER BY "day" ASC
        "#
    );
    let rows = sqlx::query(&sql).bind(since).fetch_all(pool).await?;
    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(DailyCount {
            date: row.try_get("day")?,
            count: row.try_get("count")?,
        });
    }
    Ok(items)
}

pub async fn analytics(pool: &SqlitePool, period: AnalyticsPeriod) -> Result<Analytics, ServiceError> {
    let since = iso_from(Utc::now() - Duration::days(period.days()));
    Ok(Analytics {
        period: period.label(),
        new_users: daily_counts(pool, "users", "created_at", "", &since).await?,
        completed_assessments: daily_counts(
            pool,
            "assessments",
            "completed_at",
            r#"AND "status" = 'completed'"#,
            &since,
        )
        .await?,
        puzzle_attempts: daily_counts(pool, "puzzle_attempts", "created_at", "", &since).await?,
        forum_posts: daily_counts(pool, "forum_posts", "created_at", "", &since).await?,
        since,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct UserTotals {
    pub total: i64,
    pub active: i64,
    pub pending_verification: i64,
    pub new_this_week: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reports {
    pub users: UserTotals,
    pub assessments_completed: i64,
    pub assessment_completion_rate: f64,
    pub forum_posts: i64,
    pub forum_replies: i64,
    pub flagged_posts: i64,
    pub puzzles: i64,
    pub puzzle_attempts: i64,
    pub puzzle_success_rate: f64,
    pub coin_transactions: i64,
    pub coins_distributed: i64,
    pub coins_redeemed: i64,
}

/// Percentage rounded to two decimals; 0 when there is nothing to divide by.
pub fn percentage(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 * 10_000.0 / whole as f64).round() / 100.0
}

async fn scalar(pool: &SqlitePool, sql: &str) -> Result<i64, ServiceError> {
    Ok(sqlx::query_scalar(sql).fetch_one(pool).await?)
}

pub async fn reports(pool: &SqlitePool) -> Result<Reports, ServiceError> {
    let week_ago = iso_from(Utc::now() - Duration::days(7));
    let new_this_week: i64 =
        sqlx::query_scalar(r#"SELECT COUNT(*) FROM "users" WHERE "created_at" >= ?"#)
            .bind(&week_ago)
            .fetch_one(pool)
            .await?;

    let total_users = scalar(pool, r#"SELECT COUNT(*) FROM "users""#).await?;
    let users_assessed =
        scalar(pool, r#"SELECT COUNT(*) FROM "users" WHERE "assessment_completed" = 1"#).await?;
    let puzzle_attempts = scalar(pool, r#"SELECT COUNT(*) FROM "puzzle_attempts""#).await?;
    let correct_attempts =
        scalar(pool, r#"SELECT COUNT(*) FROM "puzzle_attempts" WHERE "status" = 'correct'"#).await?;

    Ok(Reports {
        users: UserTotals {
            total: total_users,
            active: scalar(pool, r#"SELECT COUNT(*) FROM "users" WHERE "account_status" = 'active'"#)
                .await?,
            pending_verification: scalar(
                pool,
                r#"SELECT COUNT(*) FROM "users" WHERE "account_status" = 'pending_verification'"#,
            )
            .await?,
            new_this_week,
        },
        assessments_completed: scalar(
            pool,
            r#"SELECT COUNT(*) FROM "assessments" WHERE "status" = 'completed'"#,
        )
        .await?,
        assessment_completion_rate: percentage(users_assessed, total_users),
        forum_posts: scalar(pool, r#"SELECT COUNT(*) FROM "forum_posts""#).await?,
        forum_replies: scalar(pool, r#"SELECT COUNT(*) FROM "forum_replies""#).await?,
        flagged_posts: scalar(pool, r#"SELECT COUNT(*) FROM "forum_posts" WHERE "status" = 'flagged'"#)
            .await?,
        puzzles: scalar(pool, r#"SELECT COUNT(*) FROM "puzzles""#).await?,
        puzzle_attempts,
        puzzle_success_rate: percentage(correct_attempts, puzzle_attempts),
        coin_transactions: scalar(pool, r#"SELECT COUNT(*) FROM "coin_transactions""#).await?,
        coins_distributed: scalar(
            pool,
            r#"SELECT COALESCE(SUM("amount"), 0) FROM "coin_transactions" WHERE "transaction_type" IN ('earned', 'bonus')"#,
        )
        .await?,
        coins_redeemed: scalar(
            pool,
            r#"SELECT COALESCE(SUM("amount"), 0) FROM "coin_transactions" WHERE "transaction_type" = 'spent'"#,
        )
        .await?,
    })
}

// ---------------------------------------------------------------------------
// Coin adjustments
// ---------------------------------------------------------------------------

pub const MAX_COIN_ADJUSTMENT: i64 = 1_000_000;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoinAdjustment {
    pub user_id: Option<String>,
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

pub async fn adjust_coins(
    pool: &SqlitePool,
    admin_id: &str,
    input: &CoinAdjustment,
) -> Result<CoinTransaction, ServiceError> {
    let user_id = input.user_id.as_deref().unwrap_or_default();
    let amount = input.amount.unwrap_or_default();
    let reason = input.reason.as_deref().unwrap_or_default().trim();
    Validator::new()
        .check(!user_id.is_empty(), "user_id is required")
        .check(amount != 0, "Amount must be a non-zero number")
        .check(
            (-MAX_COIN_ADJUSTMENT..=MAX_COIN_ADJUSTMENT).contains(&amount),
            "Amount must be between -1000000 and 1000000",
        )
        .check(char_len_between(reason, 1, 500), "Reason is required")
        .finish()?;

    let kind = if amount > 0 {
        TransactionType::Bonus
    } else {
        TransactionType::Penalty
    };
    let record = coins::apply_standalone(
        pool,
        CoinEntry {
            user_id,
            kind,
            source: CoinSource::Admin,
            amount: amount.abs(),
            reason,
            reference_id: Some(admin_id),
        },
    )
    .await?;

    tracing::info!(admin_id, user_id, amount, "admin adjusted coins");
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_rounding() {
        assert_eq!(percentage(1, 3), 33.33);
        assert_eq!(percentage(2, 3), 66.67);
        assert_eq!(percentage(5, 0), 0.0);
        assert_eq!(percentage(4, 4), 100.0);
    }

    #[test]
    fn test_moderation_actions() {
        assert_eq!(ModerationAction::parse(Some("flag")).unwrap().status(), "flagged");
        assert_eq!(ModerationAction::parse(Some("approve")).unwrap().status(), "active");
        assert!(ModerationAction::parse(Some("ban")).is_err());
        assert!(ModerationAction::parse(None).is_err());
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(AnalyticsPeriod::parse(None).unwrap().days(), 30);
        assert_eq!(AnalyticsPeriod::parse(Some("7d")).unwrap(), AnalyticsPeriod::Week);
        assert!(AnalyticsPeriod::parse(Some("1y")).is_err());
    }

    #[test]
    fn test_college_input_required_fields() {
        let empty = CollegeInput::default();
        assert!(empty.validate(false).is_err());
        assert!(empty.validate(true).is_ok());

        let full = CollegeInput {
            name: Some("Institute of Technology".into()),
            code: Some("IT01".into()),
            kind: Some("government".into()),
            city: Some("Pune".into()),
            state: Some("Maharashtra".into()),
            ..Default::default()
        };
        assert!(full.validate(false).is_ok());

        let bad_type = CollegeInput {
            kind: Some("public".into()),
            ..Default::default()
        };
        assert!(bad_type.validate(true).is_err());
    }
}
