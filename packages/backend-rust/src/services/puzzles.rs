use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::CoinRewards;
use crate::services::coins::{self, CoinEntry, CoinSource, TransactionType};
use crate::services::{iso_from, json_column, now_iso, PageInfo, PageQuery, ServiceError};

pub const LEADERBOARD_DEFAULT_LIMIT: i64 = 50;
pub const LEADERBOARD_MAX_LIMIT: i64 = 100;
const MAX_SUBMISSION_CHARS: usize = 10_000;

#[derive(Debug, Clone, Serialize)]
pub struct PuzzleCategory {
    pub id: i64,
    pub name: String,
    pub course: String,
    pub description: Option<String>,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
    pub course: String,
}

/// Puzzle as shown to a solver; the solution never leaves the server.
#[derive(Debug, Clone, Serialize)]
pub struct PuzzleView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub difficulty: String,
    pub problem_statement: String,
    pub hints: Vec<String>,
    pub time_limit: Option<i64>,
    pub attempt_count: i64,
    pub success_rate: f64,
    pub category: Option<CategoryRef>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attempt {
    pub id: String,
    pub user_id: String,
    pub puzzle_id: i64,
    pub submission: String,
    pub status: String,
    pub score: i64,
    pub coins_earned: i64,
    pub time_taken: Option<i64>,
    pub attempt_date: String,
    pub created_at: String,
}

fn map_attempt(row: &SqliteRow) -> Result<Attempt, sqlx::Error> {
    Ok(Attempt {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        puzzle_id: row.try_get("puzzle_id")?,
        submission: row.try_get("submission")?,
        status: row.try_get("status")?,
        score: row.try_get("score")?,
        coins_earned: row.try_get("coins_earned")?,
        time_taken: row.try_get("time_taken")?,
        attempt_date: row.try_get("attempt_date")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_view(row: &SqliteRow) -> Result<PuzzleView, sqlx::Error> {
    let category_id: Option<i64> = row.try_get("category_id")?;
    let category_name: Option<String> = row.try_get("category_name")?;
    let category_course: Option<String> = row.try_get("category_course")?;
    let category = match (category_id, category_name, category_course) {
        (Some(id), Some(name), Some(course)) => Some(CategoryRef { id, name, course }),
        _ => None,
    };

    Ok(PuzzleView {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        difficulty: row.try_get("difficulty")?,
        problem_statement: row.try_get("problem_statement")?,
        hints: json_column(row.try_get("hints")?),
        time_limit: row.try_get("time_limit")?,
        attempt_count: row.try_get("attempt_count")?,
        success_rate: row.try_get("success_rate")?,
        category,
    })
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Index of the day's puzzle among `count` active puzzles.
pub fn daily_index(date: NaiveDate, count: i64) -> Option<i64> {
    (count > 0).then(|| i64::from(date.ordinal()) % count)
}

pub fn is_correct(submission: &str, solution: &str) -> bool {
    let expected = solution.trim().to_lowercase();
    !expected.is_empty() && submission.trim().to_lowercase() == expected
}

pub async fn categories(pool: &SqlitePool) -> Result<Vec<PuzzleCategory>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "name", "course", "description", "sort_order"
        FROM "puzzle_categories"
        WHERE "active" = 1
        ORDER BY "sort_order" ASC, "name" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(PuzzleCategory {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            course: row.try_get("course")?,
            description: row.try_get("description")?,
            sort_order: row.try_get("sort_order")?,
        });
    }
    Ok(items)
}

pub async fn courses(pool: &SqlitePool) -> Result<Vec<String>, ServiceError> {
    Ok(sqlx::query_scalar(
        r#"SELECT DISTINCT "course" FROM "puzzle_categories" WHERE "active" = 1 ORDER BY "course" ASC"#,
    )
    .fetch_all(pool)
    .await?)
}

#[derive(Debug, Clone, Serialize)]
pub struct DailyPuzzle {
    pub puzzle: PuzzleView,
    pub attempted_today: bool,
    pub attempt: Option<Attempt>,
}

pub async fn daily(pool: &SqlitePool, user_id: &str, date: NaiveDate) -> Result<DailyPuzzle, ServiceError> {
    let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "puzzles" WHERE "active" = 1"#)
        .fetch_one(pool)
        .await?;
    let index = daily_index(date, count)
        .ok_or_else(|| ServiceError::not_found("No daily puzzle available"))?;

    let row = sqlx::query(
        r#"
        SELECT p.*, c."name" AS "category_name", c."course" AS "category_course"
        FROM "puzzles" p
        LEFT JOIN "puzzle_categories" c ON c."id" = p."category_id"
        WHERE p."active" = 1
        ORDER BY p."id" ASC
        LIMIT 1 OFFSET ?
        "#,
    )
    .bind(index)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("No daily puzzle available"))?;
    let puzzle = map_view(&row)?;

    let attempt = sqlx::query(
        r#"
        SELECT * FROM "puzzle_attempts"
        WHERE "user_id" = ? AND "puzzle_id" = ? AND "attempt_date" = ?
        ORDER BY "created_at" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .bind(puzzle.id)
    .bind(date.to_string())
    .fetch_optional(pool)
    .await?
    .as_ref()
    .map(map_attempt)
    .transpose()?;

    Ok(DailyPuzzle {
        puzzle,
        attempted_today: attempt.is_some(),
        attempt,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptRequest {
    pub puzzle_id: Option<i64>,
    pub solution: Option<String>,
    pub time_taken: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptOutcome {
    pub attempt: Attempt,
    pub coins_earned: i64,
    pub is_correct: bool,
    pub score: i64,
}

pub async fn attempt(
    pool: &SqlitePool,
    rewards: &CoinRewards,
    user_id: &str,
    request: &AttemptRequest,
) -> Result<AttemptOutcome, ServiceError> {
    let puzzle_id = request
        .puzzle_id
        .filter(|id| *id > 0)
        .ok_or_else(|| ServiceError::validation("A valid puzzle_id is required"))?;
    let submission = request
        .solution
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServiceError::validation("Solution is required"))?;
    if submission.chars().count() > MAX_SUBMISSION_CHARS {
        return Err(ServiceError::validation("Solution is too long"));
    }
    if request.time_taken.is_some_and(|t| t < 0) {
        return Err(ServiceError::validation("time_taken must not be negative"));
    }

    let row = sqlx::query(
        r#"SELECT "title", "difficulty", "solution" FROM "puzzles" WHERE "id" = ? AND "active" = 1"#,
    )
    .bind(puzzle_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Puzzle not found"))?;
    let title: String = row.try_get("title")?;
    let difficulty: String = row.try_get("difficulty")?;
    let solution: String = row.try_get("solution")?;

    let correct = is_correct(submission, &solution);
    let score = if correct { 100 } else { 0 };
    let date = today();
    let date_key = date.to_string();

    let mut tx = pool.begin().await?;

    let already_solved: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM "puzzle_attempts"
        WHERE "user_id" = ? AND "puzzle_id" = ? AND "attempt_date" = ? AND "status" = 'correct'
        "#,
    )
    .bind(user_id)
    .bind(puzzle_id)
    .bind(&date_key)
    .fetch_one(&mut *tx)
    .await?;
    let rewarded = correct && already_solved == 0;
    let coins_earned = if rewarded { rewards.for_puzzle(&difficulty) } else { 0 };

    let attempt = Attempt {
        id: Uuid::new_v4().to_string(),
        user_id: user_id.to_string(),
        puzzle_id,
        submission: submission.to_string(),
        status: if correct { "correct" } else { "incorrect" }.to_string(),
        score,
        coins_earned,
        time_taken: request.time_taken,
        attempt_date: date_key.clone(),
        created_at: now_iso(),
    };

    sqlx::query(
        r#"
        INSERT INTO "puzzle_attempts"
          ("id", "user_id", "puzzle_id", "submission", "status", "score", "coins_earned",
           "time_taken", "attempt_date", "created_at")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&attempt.id)
    .bind(&attempt.user_id)
    .bind(attempt.puzzle_id)
    .bind(&attempt.submission)
    .bind(&attempt.status)
    .bind(attempt.score)
    .bind(attempt.coins_earned)
    .bind(attempt.time_taken)
    .bind(&attempt.attempt_date)
    .bind(&attempt.created_at)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE "puzzles"
        SET "attempt_count" = "attempt_count" + 1,
            "success_count" = "success_count" + ?,
            "success_rate" = ROUND(("success_count" + ?) * 100.0 / ("attempt_count" + 1), 2)
        WHERE "id" = ?
        "#,
    )
    .bind(i64::from(correct))
    .bind(i64::from(correct))
    .bind(puzzle_id)
    .execute(&mut *tx)
    .await?;

    if rewarded {
        let yesterday = (date - Duration::days(1)).to_string();
        let solved_yesterday: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM "puzzle_attempts"
            WHERE "user_id" = ? AND "attempt_date" = ? AND "status" = 'correct'
            "#,
        )
        .bind(user_id)
        .bind(&yesterday)
        .fetch_one(&mut *tx)
        .await?;
        let solved_today_before: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM "puzzle_attempts"
            WHERE "user_id" = ? AND "attempt_date" = ? AND "status" = 'correct' AND "id" <> ?
            "#,
        )
        .bind(user_id)
        .bind(&date_key)
        .bind(&attempt.id)
        .fetch_one(&mut *tx)
        .await?;

        // Streak counts days, not puzzles.
        let streak_sql = if solved_today_before > 0 {
            r#"UPDATE "users" SET "puzzles_solved" = "puzzles_solved" + 1, "updated_at" = ? WHERE "id" = ?"#
        } else if solved_yesterday > 0 {
            r#"UPDATE "users" SET "puzzles_solved" = "puzzles_solved" + 1, "current_streak" = "current_streak" + 1, "updated_at" = ? WHERE "id" = ?"#
        } else {
            r#"UPDATE "users" SET "puzzles_solved" = "puzzles_solved" + 1, "current_streak" = 1, "updated_at" = ? WHERE "id" = ?"#
        };
        sqlx::query(streak_sql)
            .bind(now_iso())
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        coins::apply(
            &mut tx,
            CoinEntry {
                user_id,
                kind: TransactionType::Earned,
                source: CoinSource::Puzzle,
                amount: coins_earned,
                reason: &format!("Solved {} puzzle: {}", difficulty.to_lowercase(), title),
                reference_id: Some(&attempt.id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(user_id, puzzle_id, correct, coins_earned, "puzzle attempt recorded");

    Ok(AttemptOutcome {
        attempt,
        coins_earned,
        is_correct: correct,
        score,
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: String,
    pub puzzle_id: i64,
    pub puzzle_title: String,
    pub difficulty: String,
    pub category: Option<String>,
    pub course: Option<String>,
    pub status: String,
    pub score: i64,
    pub coins_earned: i64,
    pub time_taken: Option<i64>,
    pub created_at: String,
}

pub async fn history(
    pool: &SqlitePool,
    user_id: &str,
    page: PageQuery,
) -> Result<(Vec<HistoryEntry>, PageInfo), ServiceError> {
    let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "puzzle_attempts" WHERE "user_id" = ?"#)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT a."id", a."puzzle_id", a."status", a."score", a."coins_earned", a."time_taken", a."created_at",
               p."title", p."difficulty", c."name" AS "category_name", c."course" AS "category_course"
        FROM "puzzle_attempts" a
        JOIN "puzzles" p ON p."id" = a."puzzle_id"
        LEFT JOIN "puzzle_categories" c ON c."id" = p."category_id"
        WHERE a."user_id" = ?
        ORDER BY a."created_at" DESC, a."rowid" DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(HistoryEntry {
            id: row.try_get("id")?,
            puzzle_id: row.try_get("puzzle_id")?,
            puzzle_title: row.try_get("title")?,
            difficulty: row.try_get("difficulty")?,
            category: row.try_get("category_name")?,
            course: row.try_get("category_course")?,
            status: row.try_get("status")?,
            score: row.try_get("score")?,
            coins_earned: row.try_get("coins_earned")?,
            time_taken: row.try_get("time_taken")?,
            created_at: row.try_get("created_at")?,
        });
    }
    Ok((items, page.info(total)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Daily,
    Weekly,
    Monthly,
    AllTime,
}

impl LeaderboardPeriod {
    pub fn parse(value: Option<&str>) -> Result<Self, ServiceError> {
        match value.unwrap_or("all_time") {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "all_time" => Ok(Self::AllTime),
            _ => Err(ServiceError::validation(
                "Period must be daily, weekly, monthly or all_time",
            )),
        }
    }

    /// Earliest `created_at` counted, or `None` for all time.
    pub fn since(&self) -> Option<String> {
        let now = Utc::now();
        match self {
            Self::Daily => now
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .map(|midnight| iso_from(DateTime::<Utc>::from_naive_utc_and_offset(midnight, Utc))),
            Self::Weekly => Some(iso_from(now - Duration::days(7))),
            Self::Monthly => Some(iso_from(now - Duration::days(30))),
            Self::AllTime => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: String,
    pub name: String,
    pub puzzles_solved: i64,
    pub coins_earned: i64,
}

pub async fn leaderboard(
    pool: &SqlitePool,
    period: LeaderboardPeriod,
    limit: Option<i64>,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let limit = limit
        .unwrap_or(LEADERBOARD_DEFAULT_LIMIT)
        .clamp(1, LEADERBOARD_MAX_LIMIT);
    let since = period.since();

    let rows = sqlx::query(
        r#"
        SELECT u."id", u."name",
               COUNT(a."id") AS "solved",
               COALESCE(SUM(a."coins_earned"), 0) AS "coins"
        FROM "puzzle_attempts" a
        JOIN "users" u ON u."id" = a."user_id"
        WHERE a."status" = 'correct'
          AND u."account_status" <> 'inactive'
          AND (? IS NULL OR a."created_at" >= ?)
        GROUP BY u."id", u."name"
        ORDER BY "solved" DESC, "coins" DESC, u."name" ASC
        LIMIT ?
        "#,
    )
    .bind(&since)
    .bind(&since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut entries = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        entries.push(LeaderboardEntry {
            rank: idx as i64 + 1,
            user_id: row.try_get("id")?,
            name: row.try_get("name")?,
            puzzles_solved: row.try_get("solved")?,
            coins_earned: row.try_get("coins")?,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solution_comparison_ignores_case_and_whitespace() {
        assert!(is_correct("  o(LOG n) ", "O(log n)"));
        assert!(is_correct("Goat", "goat"));
        assert!(!is_correct("sheep", "goat"));
        assert!(!is_correct("", ""));
    }

    #[test]
    fn test_daily_index_uses_day_of_year() {
        let jan_first = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(daily_index(jan_first, 5), Some(1));
        let feb_first = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(daily_index(feb_first, 5), Some(32 % 5));
        assert_eq!(daily_index(jan_first, 0), None);
    }

    #[test]
    fn test_period_parsing() {
        assert_eq!(LeaderboardPeriod::parse(None).unwrap(), LeaderboardPeriod::AllTime);
        assert_eq!(
            LeaderboardPeriod::parse(Some("weekly")).unwrap(),
            LeaderboardPeriod::Weekly
        );
        assert!(LeaderboardPeriod::parse(Some("yearly")).is_err());
        assert!(LeaderboardPeriod::AllTime.since().is_none());
        assert!(LeaderboardPeriod::Daily.since().unwrap().ends_with("T00:00:00.000Z"));
    }
}
