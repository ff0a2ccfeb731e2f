//! Assessment lifecycle: question bank, start, submit (scoring + reward) and history.

use career_algo::{AssessmentResult, AssessmentScorer, QuestionResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::services::coins::{self, CoinEntry, CoinSource, TransactionType};
use crate::services::{json_column, now_iso, PageInfo, PageQuery, ServiceError};

pub const ASSESSMENT_VERSION: &str = "1.0";
pub const MIN_RESPONSES: usize = 1;
pub const MAX_RESPONSES: usize = 12;

#[derive(Debug, Clone, Serialize)]
pub struct Question {
    pub id: i64,
    pub question_number: i64,
    pub category: String,
    pub question_text: String,
    pub options: Vec<String>,
}

pub async fn active_questions(pool: &SqlitePool) -> Result<Vec<Question>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT "id", "question_number", "category", "question_text", "options"
        FROM "assessment_questions"
        WHERE "active" = 1
        ORDER BY "question_number" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut questions = Vec::with_capacity(rows.len());
    for row in &rows {
        questions.push(Question {
            id: row.try_get("id")?,
            question_number: row.try_get("question_number")?,
            category: row.try_get("category")?,
            question_text: row.try_get("question_text")?,
            options: json_column(row.try_get("options")?),
        });
    }
    Ok(questions)
}

#[derive(Debug, Clone, Serialize)]
pub struct Assessment {
    pub id: String,
    pub user_id: String,
    pub assessment_version: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub coins_earned: i64,
    pub responses: Option<Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// Persisted scoring output, as stored at submission time.
#[derive(Debug, Clone, Serialize)]
pub struct StoredResults {
    pub career_scores: Value,
    pub personality_profile: Value,
    pub recommended_careers: Value,
    pub learning_style: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentDetail {
    pub assessment: Assessment,
    pub results: StoredResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssessmentSummary {
    pub id: String,
    pub assessment_version: String,
    pub status: String,
    pub started_at: String,
    pub completed_at: Option<String>,
    pub duration_minutes: Option<i64>,
    pub coins_earned: i64,
    pub top_career: Option<String>,
}

fn optional_json(raw: Option<String>) -> Option<Value> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
}

fn map_assessment(row: &SqliteRow) -> Result<Assessment, sqlx::Error> {
    Ok(Assessment {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        assessment_version: row.try_get("assessment_version")?,
        status: row.try_get("status")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        coins_earned: row.try_get("coins_earned")?,
        responses: optional_json(row.try_get("responses")?),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_detail(row: &SqliteRow) -> Result<AssessmentDetail, sqlx::Error> {
    let stored = |column: &str| -> Result<Value, sqlx::Error> {
        Ok(optional_json(row.try_get(column)?).unwrap_or(Value::Null))
    };
    Ok(AssessmentDetail {
        assessment: map_assessment(row)?,
        results: StoredResults {
            career_scores: stored("career_scores")?,
            personality_profile: stored("personality_profile")?,
            recommended_careers: stored("recommended_careers")?,
            learning_style: stored("learning_style")?,
        },
    })
}

fn top_career(recommended: Option<String>) -> Option<String> {
    let careers: Vec<Value> = json_column(recommended);
    careers
        .first()
        .and_then(|entry| entry.get("career"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn map_summary(row: &SqliteRow) -> Result<AssessmentSummary, sqlx::Error> {
    Ok(AssessmentSummary {
        id: row.try_get("id")?,
        assessment_version: row.try_get("assessment_version")?,
        status: row.try_get("status")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
        duration_minutes: row.try_get("duration_minutes")?,
        coins_earned: row.try_get("coins_earned")?,
        top_career: top_career(row.try_get("recommended_careers")?),
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub resumed: bool,
    pub assessment: Assessment,
}

async fn find_in_progress(pool: &SqlitePool, user_id: &str) -> Result<Option<Assessment>, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "assessments"
        WHERE "user_id" = ? AND "status" = 'in_progress'
        ORDER BY "started_at" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_assessment).transpose()?)
}

/// Resumes the open assessment or opens a new one.
pub async fn start(pool: &SqlitePool, user_id: &str) -> Result<StartOutcome, ServiceError> {
    if let Some(existing) = find_in_progress(pool, user_id).await? {
        return Ok(StartOutcome {
            resumed: true,
            assessment: existing,
        });
    }

    let id = Uuid::new_v4().to_string();
    let now = now_iso();
    sqlx::query(
        r#"
        INSERT INTO "assessments"
          ("id", "user_id", "assessment_version", "status", "started_at", "created_at", "updated_at")
        VALUES (?, ?, ?, 'in_progress', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(ASSESSMENT_VERSION)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(user_id, assessment_id = %id, "assessment started");

    let assessment = find_in_progress(pool, user_id)
        .await?
        .ok_or_else(|| ServiceError::Internal("assessment vanished after insert".to_string()))?;
    Ok(StartOutcome {
        resumed: false,
        assessment,
    })
}

fn has_question_id(item: &Value) -> bool {
    match item.get("questionId").or_else(|| item.get("question_id")) {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

fn has_answer(item: &Value) -> bool {
    match item.get("answer") {
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Number(_)) => true,
        _ => false,
    }
}

/// Checks the submission shape before it reaches the scorer.
pub fn validate_responses(raw: Option<&Value>) -> Result<Vec<QuestionResponse>, ServiceError> {
    let items = raw
        .and_then(Value::as_array)
        .ok_or_else(|| ServiceError::validation("Responses must be an array"))?;

    if !(MIN_RESPONSES..=MAX_RESPONSES).contains(&items.len()) {
        return Err(ServiceError::validation(format!(
            "Responses must contain between {MIN_RESPONSES} and {MAX_RESPONSES} items"
        )));
    }

    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            if !has_question_id(item) {
                return Err(ServiceError::validation(format!(
                    "Response {} is missing a question id",
                    idx + 1
                )));
            }
            if !has_answer(item) {
                return Err(ServiceError::validation(format!(
                    "Response {} is missing an answer",
                    idx + 1
                )));
            }
            serde_json::from_value(item.clone()).map_err(|err| {
                ServiceError::validation(format!("Response {} is malformed: {err}", idx + 1))
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOutcome {
    pub assessment_id: String,
    pub results: AssessmentResult,
    pub coins_earned: i64,
    pub duration_minutes: i64,
}

fn duration_minutes(started_at: &str, finished: DateTime<Utc>) -> i64 {
    DateTime::parse_from_rfc3339(started_at)
        .map(|start| {
            let millis = (finished - start.with_timezone(&Utc)).num_milliseconds().max(0);
            (millis + 30_000) / 60_000
        })
        .unwrap_or(0)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, ServiceError> {
    serde_json::to_string(value)
        .map_err(|err| ServiceError::Internal(format!("failed to encode assessment result: {err}")))
}

/// Scores the open assessment, stores the result and credits the reward atomically.
pub async fn submit(
    pool: &SqlitePool,
    scorer: &AssessmentScorer,
    user_id: &str,
    responses: &[QuestionResponse],
    reward: i64,
) -> Result<SubmitOutcome, ServiceError> {
    let assessment = find_in_progress(pool, user_id)
        .await?
        .ok_or_else(|| ServiceError::not_found("No active assessment found"))?;

    let finished = Utc::now();
    let duration = duration_minutes(&assessment.started_at, finished);

    let results = scorer.process_fresh(responses).map_err(|err| {
        tracing::error!(user_id, assessment_id = %assessment.id, detail = err.detail(), "scoring failed");
        ServiceError::Processing(err.to_string())
    })?;

    let finished_at = crate::services::iso_from(finished);
    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r#"
        UPDATE "assessments"
        SET "status" = 'completed', "completed_at" = ?, "duration_minutes" = ?, "responses" = ?,
            "career_scores" = ?, "personality_profile" = ?, "recommended_careers" = ?,
            "learning_style" = ?, "coins_earned" = ?, "updated_at" = ?
        WHERE "id" = ? AND "status" = 'in_progress'
        "#,
    )
    .bind(&finished_at)
    .bind(duration)
    .bind(to_json(&responses)?)
    .bind(to_json(&results.career_scores)?)
    .bind(to_json(&results.personality_profile)?)
    .bind(to_json(&results.recommended_careers)?)
    .bind(to_json(&results.learning_style)?)
    .bind(reward)
    .bind(&finished_at)
    .bind(&assessment.id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(ServiceError::Conflict(
            "Assessment was already submitted".to_string(),
        ));
    }

    if reward > 0 {
        coins::apply(
            &mut tx,
            CoinEntry {
                user_id,
                kind: TransactionType::Earned,
                source: CoinSource::Assessment,
                amount: reward,
                reason: "Career assessment completion",
                reference_id: Some(&assessment.id),
            },
        )
        .await?;
    }

    sqlx::query(
        r#"
        UPDATE "users"
        SET "assessment_completed" = 1, "assessment_completed_at" = ?, "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&finished_at)
    .bind(&finished_at)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id,
        assessment_id = %assessment.id,
        responses = responses.len(),
        duration_minutes = duration,
        "assessment submitted"
    );

    Ok(SubmitOutcome {
        assessment_id: assessment.id,
        results,
        coins_earned: reward,
        duration_minutes: duration,
    })
}

pub async fn latest_result(pool: &SqlitePool, user_id: &str) -> Result<AssessmentDetail, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "assessments"
        WHERE "user_id" = ? AND "status" = 'completed'
        ORDER BY "completed_at" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("No completed assessment found"))?;
    Ok(map_detail(&row)?)
}

pub async fn result_by_id(
    pool: &SqlitePool,
    user_id: &str,
    assessment_id: &str,
) -> Result<AssessmentDetail, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "assessments"
        WHERE "id" = ? AND "user_id" = ? AND "status" = 'completed'
        "#,
    )
    .bind(assessment_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("Assessment not found"))?;
    Ok(map_detail(&row)?)
}

pub async fn latest_summary(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Option<AssessmentSummary>, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT * FROM "assessments"
        WHERE "user_id" = ? AND "status" = 'completed'
        ORDER BY "completed_at" DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(map_summary).transpose()?)
}

pub async fn history(
    pool: &SqlitePool,
    user_id: &str,
    page: PageQuery,
) -> Result<(Vec<AssessmentSummary>, PageInfo), ServiceError> {
    let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "assessments" WHERE "user_id" = ?"#)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(
        r#"
        SELECT * FROM "assessments"
        WHERE "user_id" = ?
        ORDER BY "created_at" DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(user_id)
    .bind(page.limit())
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let items = rows
        .iter()
        .map(map_summary)
        .collect::<Result<Vec<_>, _>>()?;
    Ok((items, page.info(total)))
}
