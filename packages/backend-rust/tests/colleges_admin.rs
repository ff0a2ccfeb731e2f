use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::TestApp;

async fn college_id(app: &TestApp, code: &str) -> i64 {
    sqlx::query_scalar(r#"SELECT "id" FROM "colleges" WHERE "code" = ?"#)
        .bind(code)
        .fetch_one(app.state.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_search_filters_and_ranking_order() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (status, body) = app.get("/api/colleges/search?state=Karnataka", &token).await;
    assert_eq!(status, StatusCode::OK);
    let colleges = body["data"]["colleges"].as_array().unwrap();
    assert_eq!(colleges.len(), 2);
    assert_eq!(colleges[0]["code"], "MIT-MANIPAL");
    assert_eq!(colleges[1]["nirf_ranking"], serde_json::Value::Null);

    let (_, body) = app
        .get("/api/colleges/search?query=Delhi&ranking_max=5", &token)
        .await;
    let codes: Vec<&str> = body["data"]["colleges"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, ["AIIMS", "IITD"]);

    let (status, _) = app.get("/api/colleges/search?query=a", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app.get("/api/colleges/search?type=online", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_detail_and_compare() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;
    let iitd = college_id(&app, "IITD").await;
    let aiims = college_id(&app, "AIIMS").await;

    let (status, body) = app.get(&format!("/api/colleges/{iitd}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["type"], "government");
    assert_eq!(body["data"]["courses"].as_array().unwrap().len(), 3);

    let (status, _) = app.get("/api/colleges/99999", &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/colleges/compare", &token, json!({"college_ids": [iitd, aiims]}))
        .await;
    assert_eq!(status, StatusCode::OK);
    let first = &body["data"]["comparison"][0];
    assert_eq!(first["course_count"], 3);
    assert_eq!(first["min_fee"], 150_000);
    assert_eq!(first["max_fee"], 220_000);

    for ids in [json!([iitd]), json!([iitd, iitd]), json!([1, 2, 3, 4, 5])] {
        let (status, _) = app
            .post("/api/colleges/compare", &token, json!({"college_ids": ids}))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_favorites() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;
    let srcc = college_id(&app, "SRCC").await;

    let (status, _) = app
        .post("/api/colleges/favorite", &token, json!({"college_id": srcc}))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .post("/api/colleges/favorite", &token, json!({"college_id": srcc}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "College already in favorites");

    let (status, _) = app
        .post("/api/colleges/favorite", &token, json!({"college_id": 99999}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = app.get("/api/colleges/user/favorites", &token).await;
    assert_eq!(body["data"]["favorites"][0]["college"]["code"], "SRCC");

    let (status, _) = app.delete(&format!("/api/colleges/favorite/{srcc}"), &token).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&format!("/api/colleges/favorite/{srcc}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new().await;
    let (student, _) = app.register("Asha Rao", "asha@example.com").await;

    let (status, body) = app.get("/api/admin/reports", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Access denied. Insufficient permissions.");

    let (admin, _) = app.admin("admin@example.com").await;
    let (status, body) = app.get("/api/admin/reports", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["users"]["total"], 2);
}

#[tokio::test]
async fn test_admin_user_management() {
    let app = TestApp::new().await;
    let (admin, admin_id) = app.admin("admin@example.com").await;
    let (student, student_id) = app.register("Asha Rao", "asha@example.com").await;

    let (_, body) = app.get("/api/admin/users?role=student", &admin).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);

    let (status, body) = app.get(&format!("/api/admin/users/{student_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["coins"]["balance"], 75);

    let (status, _) = app
        .put(&format!("/api/admin/users/{student_id}"), &admin, json!({"role": "overlord"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put(
            &format!("/api/admin/users/{student_id}"),
            &admin,
            json!({"account_status": "suspended", "reason": "spam"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/users/dashboard", &student).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.delete(&format!("/api/admin/users/{admin_id}"), &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You cannot delete your own account");

    let (status, _) = app.delete(&format!("/api/admin/users/{student_id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/api/users/dashboard", &student).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_college_crud() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;

    let input = json!({
        "name": "National Law School of India University",
        "code": "NLSIU",
        "type": "autonomous",
        "city": "Bengaluru",
        "state": "Karnataka",
        "nirf_ranking": 1,
        "facilities": ["Moot Court", "Library"],
    });
    let (status, body) = app.post("/api/admin/colleges", &admin, input.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, _) = app.post("/api/admin/colleges", &admin, input).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .put(&format!("/api/admin/colleges/{id}"), &admin, json!({"nirf_ranking": 3}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nirf_ranking"], 3);

    let (status, _) = app.delete(&format!("/api/admin/colleges/{id}"), &admin).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get(&format!("/api/colleges/{id}"), &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_admin_moderation_and_coin_adjustment() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;
    let (student, student_id) = app.register("Asha Rao", "asha@example.com").await;

    let (_, cats) = app.get("/api/forum/categories", &student).await;
    let category = cats["data"]["categories"][0]["id"].as_i64().unwrap();
    let (_, post) = app
        .post(
            "/api/forum/posts",
            &student,
            json!({"category_id": category, "title": "Buy cheap notes", "content": "Visit my totally legit website now."}),
        )
        .await;
    let post_id = post["data"]["id"].as_str().unwrap();

    let (status, _) = app
        .put(
            &format!("/api/admin/forum/posts/{post_id}/moderate"),
            &admin,
            json!({"action": "ban"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .put(
            &format!("/api/admin/forum/posts/{post_id}/moderate"),
            &admin,
            json!({"action": "flag", "reason": "spam"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["new_status"], "flagged");

    let (_, body) = app.get("/api/admin/forum/posts?status=flagged", &admin).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
    let (status, _) = app.get(&format!("/api/forum/posts/{post_id}"), &student).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post(
            "/api/admin/coins/adjust",
            &admin,
            json!({"user_id": student_id, "amount": 25, "reason": "Contest winner"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["transaction_type"], "bonus");
    assert_eq!(body["data"]["source"], "admin");
    assert_eq!(app.coins(&student).await, 100);

    let (status, _) = app
        .post(
            "/api/admin/coins/adjust",
            &admin,
            json!({"user_id": student_id, "amount": -500, "reason": "Abuse"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.coins(&student).await, 100);

    let (status, body) = app.get("/api/admin/analytics?period=7d", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["period"], "7d");
    let (status, _) = app.get("/api/admin/analytics?period=1y", &admin).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_coin_adjustment_rejects_out_of_range_amounts() {
    let app = TestApp::new().await;
    let (admin, _) = app.admin("admin@example.com").await;
    let (student, student_id) = app.register("Asha Rao", "asha@example.com").await;

    for amount in [i64::MAX, i64::MIN, 1_000_001, -1_000_001] {
        let (status, body) = app
            .post(
                "/api/admin/coins/adjust",
                &admin,
                json!({"user_id": student_id, "amount": amount, "reason": "Bulk grant"}),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "amount {amount}: {body}");
        assert_eq!(body["code"], "VALIDATION_ERROR");
    }
    assert_eq!(app.coins(&student).await, 75);

    let (status, _) = app
        .post(
            "/api/admin/coins/adjust",
            &admin,
            json!({"user_id": student_id, "amount": 1_000_000, "reason": "Bulk grant"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.coins(&student).await, 1_000_075);
}
