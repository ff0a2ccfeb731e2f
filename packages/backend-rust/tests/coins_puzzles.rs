use axum::http::StatusCode;
use serde_json::json;

mod common;

use common::TestApp;

async fn daily_puzzle(app: &TestApp, token: &str) -> (i64, String, String) {
    let (status, body) = app.get("/api/puzzles/daily", token).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["puzzle"].get("solution").is_none());
    let id = body["data"]["puzzle"]["id"].as_i64().unwrap();

    let (solution, difficulty): (String, String) =
        sqlx::query_as(r#"SELECT "solution", "difficulty" FROM "puzzles" WHERE "id" = ?"#)
            .bind(id)
            .fetch_one(app.state.pool())
            .await
            .unwrap();
    (id, solution, difficulty)
}

#[tokio::test]
async fn test_balance_and_transactions_after_registration() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (status, body) = app.get("/api/coins/balance", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balance"], 75);
    assert_eq!(body["data"]["total_earned"], 75);
    assert_eq!(body["data"]["total_spent"], 0);
    assert_eq!(body["data"]["recent_transactions"].as_array().unwrap().len(), 1);

    let (status, body) = app
        .get("/api/coins/transactions?type=earned&source=registration", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 1);
    let tx = &body["data"]["transactions"][0];
    assert_eq!(tx["balance_before"], 0);
    assert_eq!(tx["balance_after"], 75);

    let (status, _) = app.get("/api/coins/transactions?type=bogus", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_reward_catalog_and_redeem() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (_, body) = app.get("/api/coins/rewards", &token).await;
    assert_eq!(body["data"]["rewards"].as_array().unwrap().len(), 7);

    let (status, body) = app
        .post("/api/coins/redeem", &token, json!({"reward_id": "course_access_premium"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient coins for this redemption");

    let (status, _) = app
        .post("/api/coins/redeem", &token, json!({"reward_id": "no_such_reward"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = app
        .post("/api/coins/redeem", &token, json!({"reward_id": "ebook_discount_50"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["new_balance"], 25);
    let code = body["data"]["redemption"]["redemption_code"].as_str().unwrap();
    assert_eq!(code.len(), 14);
    assert!(code.starts_with("CN"));

    let (_, body) = app.get("/api/coins/redemptions", &token).await;
    assert_eq!(body["data"]["redemptions"].as_array().unwrap().len(), 1);
    assert_eq!(app.coins(&token).await, 25);
}

#[tokio::test]
async fn test_puzzle_attempt_rewards_once_per_day() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;
    let (id, solution, difficulty) = daily_puzzle(&app, &token).await;
    let reward = match difficulty.as_str() {
        "Easy" => 10,
        "Medium" => 20,
        _ => 30,
    };

    let (status, body) = app
        .post(
            "/api/puzzles/attempt",
            &token,
            json!({"puzzle_id": id, "solution": "definitely wrong", "time_taken": 12}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_correct"], false);
    assert_eq!(body["data"]["score"], 0);
    assert_eq!(body["data"]["coins_earned"], 0);

    let shouted = format!("  {}  ", solution.to_uppercase());
    let (_, body) = app
        .post("/api/puzzles/attempt", &token, json!({"puzzle_id": id, "solution": shouted}))
        .await;
    assert_eq!(body["data"]["is_correct"], true);
    assert_eq!(body["data"]["score"], 100);
    assert_eq!(body["data"]["coins_earned"], reward);

    let (_, body) = app
        .post("/api/puzzles/attempt", &token, json!({"puzzle_id": id, "solution": solution}))
        .await;
    assert_eq!(body["data"]["is_correct"], true);
    assert_eq!(body["data"]["coins_earned"], 0);

    assert_eq!(app.coins(&token).await, 75 + reward);

    let (_, body) = app.get("/api/puzzles/daily", &token).await;
    assert_eq!(body["data"]["attempted_today"], true);

    let (_, body) = app.get("/api/puzzles/history", &token).await;
    assert_eq!(body["data"]["pagination"]["total"], 3);

    let (_, profile) = app.get("/api/auth/profile", &token).await;
    assert_eq!(profile["data"]["total_coins"], 75 + reward);
}

#[tokio::test]
async fn test_puzzle_attempt_validation() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (status, _) = app
        .post("/api/puzzles/attempt", &token, json!({"solution": "32"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .post("/api/puzzles/attempt", &token, json!({"puzzle_id": 9999, "solution": "32"}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_leaderboard_ranks_solvers() {
    let app = TestApp::new().await;
    let (solver, solver_id) = app.register("Asha Rao", "asha@example.com").await;
    let (idle, _) = app.register("Ravi Kumar", "ravi@example.com").await;
    let (id, solution, _) = daily_puzzle(&app, &solver).await;
    app.post("/api/puzzles/attempt", &solver, json!({"puzzle_id": id, "solution": solution}))
        .await;

    let (status, body) = app.get("/api/puzzles/leaderboard?period=daily", &idle).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["period"], "daily");
    let board = body["data"]["leaderboard"].as_array().unwrap();
    assert_eq!(board[0]["user_id"], solver_id.as_str());
    assert_eq!(board[0]["rank"], 1);
    assert_eq!(board[0]["puzzles_solved"], 1);

    let (status, _) = app.get("/api/puzzles/leaderboard?period=yearly", &idle).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_puzzle_categories_and_courses() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (_, body) = app.get("/api/puzzles/categories", &token).await;
    assert!(!body["data"]["categories"].as_array().unwrap().is_empty());

    let (_, body) = app.get("/api/puzzles/courses", &token).await;
    let courses = body["data"]["courses"].as_array().unwrap();
    assert!(courses.iter().any(|c| c == "Computer Science"));
}
