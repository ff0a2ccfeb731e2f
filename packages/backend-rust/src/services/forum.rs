use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::services::validation::{char_len_between, Validator};
use crate::services::{json_column, now_iso, PageInfo, PageQuery, ServiceError};

pub const MAX_TAGS: usize = 10;
const ADMIN_ROLE: &str = "college_administrator";

#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub allowed_roles: Vec<String>,
    pub posts_count: i64,
    pub replies_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub id: String,
    pub name: String,
    pub role: String,
    pub reputation_score: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryRef {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub author: Author,
    pub category: CategoryRef,
    pub views_count: i64,
    pub replies_count: i64,
    pub votes_up: i64,
    pub votes_down: i64,
    pub vote_score: i64,
    pub is_pinned: bool,
    pub is_locked: bool,
    pub status: String,
    pub moderation_reason: Option<String>,
    pub last_activity_at: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reply {
    pub id: String,
    pub post_id: String,
    pub parent_reply_id: Option<String>,
    pub author: Author,
    pub content: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetail {
    pub post: Post,
    pub replies: Vec<Reply>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoteTally {
    pub votes_up: i64,
    pub votes_down: i64,
    pub vote_score: i64,
}

pub(crate) const POST_SELECT: &str = r#"
    SELECT p.*, u."name" AS "author_name", u."role" AS "author_role",
           u."reputation_score" AS "author_reputation", c."name" AS "category_name"
    FROM "forum_posts" p
    JOIN "users" u ON u."id" = p."user_id"
    JOIN "forum_categories" c ON c."id" = p."category_id"
"#;

const REPLY_SELECT: &str = r#"
    SELECT r.*, u."name" AS "author_name", u."role" AS "author_role",
           u."reputation_score" AS "author_reputation"
    FROM "forum_replies" r
    JOIN "users" u ON u."id" = r."user_id"
"#;

fn map_author(row: &SqliteRow) -> Result<Author, sqlx::Error> {
    Ok(Author {
        id: row.try_get("user_id")?,
        name: row.try_get("author_name")?,
        role: row.try_get("author_role")?,
        reputation_score: row.try_get("author_reputation")?,
    })
}

pub(crate) fn map_post(row: &SqliteRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: json_column(row.try_get("tags")?),
        author: map_author(row)?,
        category: CategoryRef {
            id: row.try_get("category_id")?,
            name: row.try_get("category_name")?,
        },
        views_count: row.try_get("views_count")?,
        replies_count: row.try_get("replies_count")?,
        votes_up: row.try_get("votes_up")?,
        votes_down: row.try_get("votes_down")?,
        vote_score: row.try_get("vote_score")?,
        is_pinned: row.try_get("is_pinned")?,
        is_locked: row.try_get("is_locked")?,
        status: row.try_get("status")?,
        moderation_reason: row.try_get("moderation_reason")?,
        last_activity_at: row.try_get("last_activity_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_reply(row: &SqliteRow) -> Result<Reply, sqlx::Error> {
    Ok(Reply {
        id: row.try_get("id")?,
        post_id: row.try_get("post_id")?,
        parent_reply_id: row.try_get("parent_reply_id")?,
        author: map_author(row)?,
        content: row.try_get("content")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn can_manage(owner_id: &str, user_id: &str, role: &str) -> bool {
    owner_id == user_id || role == ADMIN_ROLE
}

pub async fn categories(pool: &SqlitePool) -> Result<Vec<Category>, ServiceError> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM "forum_categories"
        WHERE "active" = 1
        ORDER BY "sort_order" ASC, "name" ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut items = Vec::with_capacity(rows.len());
    for row in &rows {
        items.push(Category {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            color: row.try_get("color")?,
            allowed_roles: json_column(row.try_get("allowed_roles")?),
            posts_count: row.try_get("posts_count")?,
            replies_count: row.try_get("replies_count")?,
        });
    }
    Ok(items)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostSort {
    #[default]
    Latest,
    Popular,
    Oldest,
    MostReplies,
}

impl PostSort {
    pub fn parse(value: Option<&str>) -> Result<Self, ServiceError> {
        match value.unwrap_or("latest") {
            "latest" => Ok(Self::Latest),
            "popular" => Ok(Self::Popular),
            "oldest" => Ok(Self::Oldest),
            "most_replies" => Ok(Self::MostReplies),
            _ => Err(ServiceError::validation(
                "Sort must be latest, popular, oldest or most_replies",
            )),
        }
    }

    fn order_by(&self) -> &'static str {
        match self {
            Self::Latest => r#" ORDER BY p."is_pinned" DESC, p."last_activity_at" DESC"#,
            Self::Popular => r#" ORDER BY p."vote_score" DESC, p."created_at" DESC"#,
            Self::Oldest => r#" ORDER BY p."created_at" ASC"#,
            Self::MostReplies => r#" ORDER BY p."replies_count" DESC, p."created_at" DESC"#,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostFilter {
    pub category_id: Option<i64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn push_post_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a PostFilter) {
    qb.push(r#" WHERE p."status" = 'active'"#);
    if let Some(category_id) = filter.category_id {
        qb.push(r#" AND p."category_id" = "#).push_bind(category_id);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{search}%");
        qb.push(r#" AND (p."title" LIKE "#)
            .push_bind(pattern.clone())
            .push(r#" OR p."content" LIKE "#)
            .push_bind(pattern)
            .push(")");
    }
}

pub async fn list_posts(
    pool: &SqlitePool,
    filter: &PostFilter,
) -> Result<(Vec<Post>, PageInfo), ServiceError> {
    let sort = PostSort::parse(filter.sort.as_deref())?;
    let page = PageQuery {
        page: filter.page,
        limit: filter.limit,
    };

    let mut count_qb: QueryBuilder<Sqlite> =
        QueryBuilder::new(r#"SELECT COUNT(*) FROM "forum_posts" p"#);
    push_post_filters(&mut count_qb, filter);
    let total: i64 = count_qb.build_query_scalar().fetch_one(pool).await?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(POST_SELECT);
    push_post_filters(&mut qb, filter);
    qb.push(sort.order_by())
        .push(" LIMIT ")
        .push_bind(page.limit())
        .push(" OFFSET ")
        .push_bind(page.offset());
    let rows = qb.build().fetch_all(pool).await?;

    let posts = rows.iter().map(map_post).collect::<Result<Vec<_>, _>>()?;
    Ok((posts, page.info(total)))
}

async fn load_post(pool: &SqlitePool, post_id: &str) -> Result<Option<Post>, ServiceError> {
    let row = sqlx::query(&format!(r#"{POST_SELECT} WHERE p."id" = ?"#))
        .bind(post_id)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(map_post).transpose()?)
}

async fn load_active_post(pool: &SqlitePool, post_id: &str) -> Result<Post, ServiceError> {
    load_post(pool, post_id)
        .await?
        .filter(|post| post.status == "active")
        .ok_or_else(|| ServiceError::not_found("Post not found"))
}

fn validate_tags(tags: &[String]) -> bool {
    tags.len() <= MAX_TAGS && tags.iter().all(|tag| char_len_between(tag, 1, 50))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewPost {
    pub category_id: Option<i64>,
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

pub async fn create_post(
    pool: &SqlitePool,
    user_id: &str,
    role: &str,
    input: &NewPost,
) -> Result<Post, ServiceError> {
    let title = input.title.as_deref().unwrap_or_default().trim();
    let content = input.content.as_deref().unwrap_or_default().trim();
    Validator::new()
        .check(input.category_id.is_some(), "Category is required")
        .check(
            char_len_between(title, 5, 200),
            "Title must be between 5 and 200 characters",
        )
        .check(
            char_len_between(content, 10, 10_000),
            "Content must be between 10 and 10000 characters",
        )
        .check(validate_tags(&input.tags), "At most 10 tags of up to 50 characters each")
        .finish()?;
    let category_id = input.category_id.unwrap_or_default();

    let allowed: Option<String> = sqlx::query_scalar(
        r#"SELECT "allowed_roles" FROM "forum_categories" WHERE "id" = ? AND "active" = 1"#,
    )
    .bind(category_id)
    .fetch_optional(pool)
    .await?;
    let allowed: Vec<String> = json_column(Some(
        allowed.ok_or_else(|| ServiceError::not_found("Category not found"))?,
    ));
    if !allowed.iter().any(|r| r == role) {
        return Err(ServiceError::forbidden(
            "You are not allowed to post in this category",
        ));
    }

    let id = Uuid::new_v4().to_string();
    let now = now_iso();
    let tags: Vec<String> = input.tags.iter().map(|t| t.trim().to_string()).collect();
    let tags_json = serde_json::to_string(&tags)
        .map_err(|err| ServiceError::Internal(format!("failed to encode tags: {err}")))?;

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO "forum_posts"
          ("id", "category_id", "user_id", "title", "content", "tags", "last_activity_at", "created_at", "updated_at")
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(category_id)
    .bind(user_id)
    .bind(title)
    .bind(content)
    .bind(&tags_json)
    .bind(&now)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    sqlx::query(r#"UPDATE "forum_categories" SET "posts_count" = "posts_count" + 1 WHERE "id" = ?"#)
        .bind(category_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(r#"UPDATE "users" SET "forum_posts" = "forum_posts" + 1 WHERE "id" = ?"#)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id, post_id = %id, category_id, "forum post created");
    load_active_post(pool, &id).await
}

pub async fn get_post(pool: &SqlitePool, post_id: &str) -> Result<PostDetail, ServiceError> {
    let bumped = sqlx::query(
        r#"UPDATE "forum_posts" SET "views_count" = "views_count" + 1 WHERE "id" = ? AND "status" = 'active'"#,
    )
    .bind(post_id)
    .execute(pool)
    .await?;
    if bumped.rows_affected() == 0 {
        return Err(ServiceError::not_found("Post not found"));
    }

    let post = load_active_post(pool, post_id).await?;
    let rows = sqlx::query(&format!(
        r#"{REPLY_SELECT} WHERE r."post_id" = ? AND r."status" = 'active' ORDER BY r."created_at" ASC"#
    ))
    .bind(post_id)
    .fetch_all(pool)
    .await?;
    let replies = rows.iter().map(map_reply).collect::<Result<Vec<_>, _>>()?;

    Ok(PostDetail { post, replies })
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PostUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

pub async fn update_post(
    pool: &SqlitePool,
    user_id: &str,
    role: &str,
    post_id: &str,
    update: &PostUpdate,
) -> Result<Post, ServiceError> {
    let post = load_active_post(pool, post_id).await?;
    if !can_manage(&post.author.id, user_id, role) {
        return Err(ServiceError::forbidden("You can only edit your own posts"));
    }

    let title = update.title.as_deref().map(str::trim);
    let content = update.content.as_deref().map(str::trim);
    Validator::new()
        .check(
            title.map_or(true, |t| char_len_between(t, 5, 200)),
            "Title must be between 5 and 200 characters",
        )
        .check(
            content.map_or(true, |c| char_len_between(c, 10, 10_000)),
            "Content must be between 10 and 10000 characters",
        )
        .check(
            update.tags.as_deref().map_or(true, validate_tags),
            "At most 10 tags of up to 50 characters each",
        )
        .finish()?;

    let tags_json = update
        .tags
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| ServiceError::Internal(format!("failed to encode tags: {err}")))?;

    sqlx::query(
        r#"
        UPDATE "forum_posts"
        SET "title" = COALESCE(?, "title"), "content" = COALESCE(?, "content"),
            "tags" = COALESCE(?, "tags"), "updated_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(title)
    .bind(content)
    .bind(tags_json)
    .bind(now_iso())
    .bind(post_id)
    .execute(pool)
    .await?;

    load_active_post(pool, post_id).await
}

pub async fn delete_post(
    pool: &SqlitePool,
    user_id: &str,
    role: &str,
    post_id: &str,
) -> Result<(), ServiceError> {
    let post = load_active_post(pool, post_id).await?;
    if !can_manage(&post.author.id, user_id, role) {
        return Err(ServiceError::forbidden("You can only delete your own posts"));
    }
    sqlx::query(r#"UPDATE "forum_posts" SET "status" = 'deleted', "updated_at" = ? WHERE "id" = ?"#)
        .bind(now_iso())
        .bind(post_id)
        .execute(pool)
        .await?;
    tracing::info!(user_id, post_id, "forum post deleted");
    Ok(())
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewReply {
    pub content: Option<String>,
    pub parent_reply_id: Option<String>,
}

async fn load_reply(pool: &SqlitePool, reply_id: &str) -> Result<Reply, ServiceError> {
    let row = sqlx::query(&format!(r#"{REPLY_SELECT} WHERE r."id" = ? AND r."status" = 'active'"#))
        .bind(reply_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("Comment not found"))?;
    Ok(map_reply(&row)?)
}

pub async fn create_reply(
    pool: &SqlitePool,
    user_id: &str,
    post_id: &str,
    input: &NewReply,
) -> Result<Reply, ServiceError> {
    let content = input.content.as_deref().unwrap_or_default().trim();
    if !char_len_between(content, 1, 5_000) {
        return Err(ServiceError::validation(
            "Comment must be between 1 and 5000 characters",
        ));
    }

    let post = load_active_post(pool, post_id).await?;
    if post.is_locked {
        return Err(ServiceError::forbidden("This post is locked for comments"));
    }
    if let Some(parent_id) = input.parent_reply_id.as_deref() {
        let parent = load_reply(pool, parent_id).await?;
        if parent.post_id != post_id {
            return Err(ServiceError::not_found("Comment not found"));
        }
    }

    let id = Uuid::new_v4().to_string();
    let now = now_iso();

    let mut tx = pool.begin().await?;
    sqlx::query(
        r#"
        INSERT INTO "forum_replies"
          ("id", "post_id", "user_id", "parent_reply_id", "content", "created_at", "updated_at")
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(post_id)
    .bind(user_id)
    .bind(&input.parent_reply_id)
    .bind(content)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        r#"
        UPDATE "forum_posts"
        SET "replies_count" = "replies_count" + 1, "last_activity_at" = ?
        WHERE "id" = ?
        "#,
    )
    .bind(&now)
    .bind(post_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(r#"UPDATE "forum_categories" SET "replies_count" = "replies_count" + 1 WHERE "id" = ?"#)
        .bind(post.category.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    load_reply(pool, &id).await
}

pub async fn update_reply(
    pool: &SqlitePool,
    user_id: &str,
    role: &str,
    reply_id: &str,
    content: Option<&str>,
) -> Result<Reply, ServiceError> {
    let reply = load_reply(pool, reply_id).await?;
    if !can_manage(&reply.author.id, user_id, role) {
        return Err(ServiceError::forbidden("You can only edit your own comments"));
    }
    let content = content.unwrap_or_default().trim();
    if !char_len_between(content, 1, 5_000) {
        return Err(ServiceError::validation(
            "Comment must be between 1 and 5000 characters",
        ));
    }

    sqlx::query(r#"UPDATE "forum_replies" SET "content" = ?, "updated_at" = ? WHERE "id" = ?"#)
        .bind(content)
        .bind(now_iso())
        .bind(reply_id)
        .execute(pool)
        .await?;
    load_reply(pool, reply_id).await
}

pub async fn delete_reply(
    pool: &SqlitePool,
    user_id: &str,
    role: &str,
    reply_id: &str,
) -> Result<(), ServiceError> {
    let reply = load_reply(pool, reply_id).await?;
    if !can_manage(&reply.author.id, user_id, role) {
        return Err(ServiceError::forbidden("You can only delete your own comments"));
    }

    let mut tx = pool.begin().await?;
    sqlx::query(r#"UPDATE "forum_replies" SET "status" = 'deleted', "updated_at" = ? WHERE "id" = ?"#)
        .bind(now_iso())
        .bind(reply_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        r#"UPDATE "forum_posts" SET "replies_count" = MAX("replies_count" - 1, 0) WHERE "id" = ?"#,
    )
    .bind(&reply.post_id)
    .execute(&mut *tx)
    .await?;
    sqlx::query(
        r#"
        UPDATE "forum_categories"
        SET "replies_count" = MAX("replies_count" - 1, 0)
        WHERE "id" = (SELECT "category_id" FROM "forum_posts" WHERE "id" = ?)
        "#,
    )
    .bind(&reply.post_id)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    Ok(())
}

async fn recount_votes(
    conn: &mut sqlx::SqliteConnection,
    post_id: &str,
) -> Result<VoteTally, ServiceError> {
    let row = sqlx::query(
        r#"
        SELECT
          COALESCE(SUM(CASE WHEN "vote_type" = 'up' THEN 1 ELSE 0 END), 0) AS "up",
          COALESCE(SUM(CASE WHEN "vote_type" = 'down' THEN 1 ELSE 0 END), 0) AS "down"
        FROM "forum_votes"
        WHERE "post_id" = ?
        "#,
    )
    .bind(post_id)
    .fetch_one(&mut *conn)
    .await?;
    let votes_up: i64 = row.try_get("up")?;
    let votes_down: i64 = row.try_get("down")?;
    let tally = VoteTally {
        votes_up,
        votes_down,
        vote_score: votes_up - votes_down,
    };

    sqlx::query(
        r#"UPDATE "forum_posts" SET "votes_up" = ?, "votes_down" = ?, "vote_score" = ? WHERE "id" = ?"#,
    )
    .bind(tally.votes_up)
    .bind(tally.votes_down)
    .bind(tally.vote_score)
    .bind(post_id)
    .execute(&mut *conn)
    .await?;
    Ok(tally)
}

pub async fn like_post(pool: &SqlitePool, user_id: &str, post_id: &str) -> Result<VoteTally, ServiceError> {
    load_active_post(pool, post_id).await?;

    let mut tx = pool.begin().await?;
    let existing: Option<String> = sqlx::query_scalar(
        r#"SELECT "id" FROM "forum_votes" WHERE "user_id" = ? AND "post_id" = ?"#,
    )
    .bind(user_id)
    .bind(post_id)
    .fetch_optional(&mut *tx)
    .await?;
    if existing.is_some() {
        return Err(ServiceError::bad_request("You have already liked this post"));
    }

    sqlx::query(
        r#"
        INSERT INTO "forum_votes" ("id", "user_id", "post_id", "vote_type", "created_at")
        VALUES (?, ?, ?, 'up', ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(post_id)
    .bind(now_iso())
    .execute(&mut *tx)
    .await?;
    let tally = recount_votes(&mut tx, post_id).await?;
    tx.commit().await?;
    Ok(tally)
}

pub async fn unlike_post(pool: &SqlitePool, user_id: &str, post_id: &str) -> Result<VoteTally, ServiceError> {
    load_active_post(pool, post_id).await?;

    let mut tx = pool.begin().await?;
    let removed = sqlx::query(r#"DELETE FROM "forum_votes" WHERE "user_id" = ? AND "post_id" = ?"#)
        .bind(user_id)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;
    if removed.rows_affected() == 0 {
        return Err(ServiceError::not_found("Like not found"));
    }
    let tally = recount_votes(&mut tx, post_id).await?;
    tx.commit().await?;
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_parsing() {
        assert_eq!(PostSort::parse(None).unwrap(), PostSort::Latest);
        assert_eq!(PostSort::parse(Some("most_replies")).unwrap(), PostSort::MostReplies);
        assert!(PostSort::parse(Some("random")).is_err());
        assert!(PostSort::Latest.order_by().contains("is_pinned"));
    }

    #[test]
    fn test_tag_limits() {
        let ten: Vec<String> = (0..10).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&ten));
        let eleven: Vec<String> = (0..11).map(|i| format!("tag{i}")).collect();
        assert!(!validate_tags(&eleven));
        assert!(!validate_tags(&["  ".to_string()]));
    }

    #[test]
    fn test_owner_or_admin() {
        assert!(can_manage("u1", "u1", "student"));
        assert!(can_manage("u1", "u2", "college_administrator"));
        assert!(!can_manage("u1", "u2", "teacher"));
    }
}
