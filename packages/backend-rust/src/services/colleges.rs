use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::services::{json_column, now_iso, PageInfo, PageQuery, ServiceError};

pub const COLLEGE_TYPES: [&str; 4] = ["government", "private", "deemed", "autonomous"];
pub const MIN_COMPARE: usize = 2;
pub const MAX_COMPARE: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct College {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: Option<String>,
    pub city: String,
    pub state: String,
    pub nirf_ranking: Option<i64>,
    pub accreditation: Option<String>,
    pub website: Option<String>,
    pub description: Option<String>,
    pub facilities: Vec<String>,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Course {
    pub id: i64,
    pub college_id: i64,
    pub name: String,
    pub code: Option<String>,
    pub degree_type: String,
    pub duration: i64,
    pub fee_per_year: Option<i64>,
    pub total_seats: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollegeDetail {
    #[serde(flatten)]
    pub college: College,
    pub courses: Vec<Course>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Favorite {
    pub id: String,
    pub college: College,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonEntry {
    #[serde(flatten)]
    pub college: College,
    pub courses: Vec<Course>,
    pub course_count: usize,
    pub min_fee: Option<i64>,
    pub max_fee: Option<i64>,
}

pub(crate) fn map_college(row: &SqliteRow) -> Result<College, sqlx::Error> {
    Ok(College {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        kind: row.try_get("type")?,
        location: row.try_get("location")?,
        city: row.try_get("city")?,
        state: row.try_get("state")?,
        nirf_ranking: row.try_get("nirf_ranking")?,
        accreditation: row.try_get("accreditation")?,
        website: row.try_get("website")?,
        description: row.try_get("description")?,
        facilities: json_column(row.try_get("facilities")?),
        active: row.try_get("active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_course(row: &SqliteRow) -> Result<Course, sqlx::Error> {
    Ok(Course {
        id: row.try_get("id")?,
        college_id: row.try_get("college_id")?,
        name: row.try_get("name")?,
        code: row.try_get("code")?,
        degree_type: row.try_get("degree_type")?,
        duration: row.try_get("duration")?,
        fee_per_year: row.try_get("fee_per_year")?,
        total_seats: row.try_get("total_seats")?,
    })
}

const RANKING_ORDER: &str = r#" ORDER BY "nirf_ranking" IS NULL, "nirf_ranking" ASC, "name" ASC"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub ranking_max: Option<i64>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl SearchQuery {
    fn validate(&self) -> Result<(), ServiceError> {
        if let Some(query) = self.query.as_deref() {
            if query.trim().chars().count() < 2 {
                return Err(ServiceError::validation(
                    "Search query must be at least 2 characters",
                ));
            }
        }
        if let Some(kind) = self.kind.as_deref() {
            if !COLLEGE_TYPES.contains(&kind) {
                return Err(ServiceError::validation(
                    "Type must be government, private, deemed or autonomous",
                ));
            }
        }
        if matches!(self.ranking_max, Some(max) if max < 1) {
            return Err(ServiceError::validation("ranking_max must be a positive number"));
        }
        Ok(())
    }

    fn push_filters<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>) {
        qb.push(r#" WHERE "active" = 1"#);
        if let Some(query) = self.query.as_deref().map(str::trim) {
            let pattern = format!("%{query}%");
            qb.push(r#" AND ("name" LIKE "#)
                .push_bind(pattern.clone())
                .push(r#" OR "code" LIKE "#)
                .push_bind(pattern.clone())
                .push(r#" OR "city" LIKE "#)
                .push_bind(pattern.clone())
                .push(r#" OR "description" LIKE "#)
                .push_bind(pattern)
                .push(")");
        }
        if let Some(state) = self.state.as_deref() {
            qb.push(r#" AND "state" = "#).push_bind(state);
        }
        if let Some(city) = self.city.as_deref() {
            qb.push(r#" AND "city" = "#).push_bind(city);
        }
        if let Some(kind) = self.kind.as_deref() {
            qb.push(r#" AND "type" = "#).push_bind(kind);
        }
        if let Some(max) = self.ranking_max {
            qb.push(r#" AND "nirf_ranking" IS NOT NULL AND "nirf_ranking" <= "#)
                .push_bind(max);
        }
    }

    fn page(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

pub async fn search(
    pool: &SqlitePool,
    query: &SearchQuery,
) -> Result<(Vec<College>, PageInfo), ServiceError> {
    query.validate()?;
    let page = query.page();

    let mut count_qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT COUNT(*) FROM "colleges""#);
    query.push_filters(&mut count_qb);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(r#"SELECT * FROM "colleges""#);
    query.push_filters(&mut qb);
    qb.push(RANKING_ORDER)
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let colleges = rows.iter().map(map_college).collect::<Result<Vec<_>, _>>()?;
    Ok((colleges, page.info(total)))
}

pub async fn list(pool: &SqlitePool, page: PageQuery) -> Result<(Vec<College>, PageInfo), ServiceError> {
    search(
        pool,
        &SearchQuery {
            page: page.page,
            limit: page.limit,
            ..SearchQuery::default()
        },
    )
    .await
}

async fn find_active(pool: &SqlitePool, college_id: i64) -> Result<College, ServiceError> {
    let row = sqlx::query(r#"SELECT * FROM "colleges" WHERE "id" = ? AND "active" = 1"#)
        .bind(college_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("College not found"))?;
    Ok(map_college(&row)?)
}

async fn active_courses(pool: &SqlitePool, college_id: i64) -> Result<Vec<Course>, ServiceError> {
    let rows = sqlx::query(
        r#"SELECT * FROM "courses" WHERE "college_id" = ? AND "active" = 1 ORDER BY "name" ASC"#,
    )
    .bind(college_id)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(map_course).collect::<Result<Vec<_>, _>>()?)
}

pub async fn detail(pool: &SqlitePool, college_id: i64) -> Result<CollegeDetail, ServiceError> {
    let college = find_active(pool, college_id).await?;
    let courses = active_courses(pool, college_id).await?;
    Ok(CollegeDetail { college, courses })
}

pub async fn add_favorite(
    pool: &SqlitePool,
    user_id: &str,
    college_id: i64,
) -> Result<Favorite, ServiceError> {
    let college = find_active(pool, college_id).await?;

    let exists: Option<String> = sqlx::query_scalar(
        r#"SELECT "id" FROM "college_favorites" WHERE "user_id" = ? AND "college_id" = ?"#,
    )
    .bind(user_id)
    .bind(college_id)
    .fetch_optional(pool)
    .await?;
    if exists.is_some() {
        return Err(ServiceError::bad_request("College already in favorites"));
    }

    let favorite = Favorite {
        id: Uuid::new_v4().to_string(),
        college,
        created_at: now_iso(),
    };
    sqlx::query(
        r#"INSERT INTO "college_favorites" ("id", "user_id", "college_id", "created_at") VALUES (?, ?, ?, ?)"#,
    )
    .bind(&favorite.id)
    .bind(user_id)
    .bind(college_id)
    .bind(&favorite.created_at)
    .execute(pool)
    .await?;
    Ok(favorite)
}

pub async fn remove_favorite(
    pool: &SqlitePool,
    user_id: &str,
    college_id: i64,
) -> Result<(), ServiceError> {
    let removed =
        sqlx::query(r#"DELETE FROM "college_favorites" WHERE "user_id" = ? AND "college_id" = ?"#)
            .bind(user_id)
            .bind(college_id)
            .execute(pool)
            .await?;
    if removed.rows_affected() == 0 {
        return Err(ServiceError::not_found("Favorite not found"));
    }
    Ok(())
}

pub async fn favorites(pool: &SqlitePool, user_id: &str) -> Result<Vec<Favorite>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT c.*, f."id" AS "favorite_id", f."created_at" AS "favorited_at"
        FROM "college_favorites" f
        JOIN "colleges" c ON c."id" = f."college_id"
        WHERE f."user_id" = ? AND c."active" = 1
        ORDER BY f."created_at" DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(Favorite {
            id: row.try_get("favorite_id")?,
            college: map_college(row)?,
            created_at: row.try_get("favorited_at")?,
        });
    }
    Ok(items)
}

/// Checks the id list for a comparison: 2 to 4 distinct ids.
pub fn validate_compare_ids(ids: &[i64]) -> Result<(), ServiceError> {
    if !(MIN_COMPARE..=MAX_COMPARE).contains(&ids.len()) {
        return Err(ServiceError::bad_request(
            "Please provide 2 to 4 colleges to compare",
        ));
    }
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    if sorted.len() != ids.len() {
        return Err(ServiceError::bad_request("College ids must be unique"));
    }
    Ok(())
}

pub async fn compare(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<ComparisonEntry>, ServiceError> {
    validate_compare_ids(ids)?;

    let mut entries = Vec::with_capacity(ids.len());
    for &id in ids {
        let college = find_active(pool, id).await?;
        let courses = active_courses(pool, id).await?;
        let fees = courses.iter().filter_map(|c| c.fee_per_year);
        let min_fee = fees.clone().min();
        let max_fee = fees.max();
        entries.push(ComparisonEntry {
            college,
            course_count: courses.len(),
            courses,
            min_fee,
            max_fee,
        });
    }
    Ok(entries)
}
