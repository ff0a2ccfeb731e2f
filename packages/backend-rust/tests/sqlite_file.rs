use axum::http::{Method, StatusCode};
use serde_json::json;
use tempfile::TempDir;

mod common;

use career_navigator_backend::config::Config;
use career_navigator_backend::db::Database;
use common::{test_config, TestApp, PASSWORD};

fn file_config(dir: &TempDir) -> Config {
    let path = dir.path().join("nested").join("career.db");
    Config {
        database_url: format!("sqlite://{}", path.display()),
        ..test_config()
    }
}

async fn count(db: &Database, table: &str) -> i64 {
    sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{table}""#))
        .fetch_one(db.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_file_database_creates_parent_dir_and_schema() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let db = Database::connect(&config.database_url).await.unwrap();
    assert!(db.ping().await);
    assert!(dir.path().join("nested").join("career.db").exists());
    assert_eq!(count(&db, "users").await, 0);
    db.close().await;
}

#[tokio::test]
async fn test_data_survives_restart_and_seed_is_idempotent() {
    let dir = TempDir::new().unwrap();

    let first = TestApp::with_config(file_config(&dir)).await;
    first.register("Asha Rao", "asha@example.com").await;
    let colleges = count(first.state.db(), "colleges").await;
    let questions = count(first.state.db(), "assessment_questions").await;
    first.state.db().close().await;

    let second = TestApp::with_config(file_config(&dir)).await;
    assert_eq!(count(second.state.db(), "colleges").await, colleges);
    assert_eq!(count(second.state.db(), "assessment_questions").await, questions);

    let (status, body) = second
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "asha@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let token = body["data"]["token"].as_str().unwrap();
    assert_eq!(second.coins(token).await, 75);
}
