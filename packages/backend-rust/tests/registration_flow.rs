use axum::http::StatusCode;
use serde_json::{json, Value};

mod common;

use career_navigator_backend::services::users;
use common::TestApp;

async fn step(app: &TestApp, token: &str, n: i64, body: Value) -> (StatusCode, Value) {
    app.post(&format!("/api/users/registration/step/{n}"), token, body)
        .await
}

#[tokio::test]
async fn test_wizard_enforces_order_and_completes() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("Asha Rao", "asha@example.com").await;

    let (_, body) = app.get("/api/users/registration/status", &token).await;
    assert_eq!(body["data"]["current_step"], 1);
    assert_eq!(body["data"]["total_steps"], 9);
    assert_eq!(body["data"]["step_details"].as_array().unwrap().len(), 9);

    let (status, body) = step(&app, &token, 3, json!({"aadhaar_number": "123412341234"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Complete previous steps first");

    let (status, _) = step(&app, &token, 1, json!({"name": "Asha Rao", "phone": "12345"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let steps = [
        json!({"name": "Asha Rao", "phone": "9876543210"}),
        json!({}),
        json!({"aadhaar_number": "123412341234"}),
        json!({"date_of_birth": "2006-04-12", "gender": "female", "address": "12 MG Road", "city": "Pune", "state": "Maharashtra", "pincode": "411001"}),
        json!({"class_10_percentage": 91.2, "class_12_percentage": 88.5, "class_12_stream": "science", "class_12_year": 2024}),
        json!({"father_name": "Ramesh Rao", "father_phone": "9812345678"}),
        json!({"documents_acknowledged": true}),
        json!({}),
    ];
    for (idx, payload) in steps.into_iter().enumerate() {
        let n = idx as i64 + 1;
        let (status, body) = step(&app, &token, n, payload).await;
        assert_eq!(status, StatusCode::OK, "step {n}: {body}");
        assert_eq!(body["data"]["current_step"], n + 1);
    }

    let (status, body) = app
        .post("/api/users/registration/complete", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["registration_completed"], true);
    assert_eq!(body["data"]["account_status"], "active");

    let welcome = app.state.email().outbox();
    assert_eq!(welcome.len(), 2);

    let (_, body) = app.get("/api/users/progress", &token).await;
    assert_eq!(body["data"]["registration_progress"], 100);

    let (_, body) = app.get("/api/users/verification/status", &token).await;
    assert_eq!(body["data"]["masked_aadhaar"], "XXXX-XXXX-1234");
    assert_eq!(body["data"]["masked_phone"], "987654-****");

    let revealed = users::reveal_aadhaar(app.state.pool(), app.state.cipher(), &user_id)
        .await
        .unwrap();
    assert_eq!(revealed.as_deref(), Some("123412341234"));
}

#[tokio::test]
async fn test_complete_registration_lists_missing_fields() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Ravi Kumar", "ravi@example.com").await;

    let (status, body) = app
        .post("/api/users/registration/complete", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let message = body["error"].as_str().unwrap();
    assert!(message.starts_with("Registration incomplete. Missing fields:"));
    assert!(message.contains("date_of_birth"));

    let (status, _) = app
        .post("/api/users/registration/step/12", &token, json!({}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_aadhaar_and_profile_sections() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Meera Iyer", "meera@example.com").await;

    let (status, _) = app
        .post("/api/users/verification/aadhaar", &token, json!({"aadhaar_number": "1234"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .post(
            "/api/users/verification/aadhaar",
            &token,
            json!({"aadhaar_number": "987698769876"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["masked_aadhaar"], "XXXX-XXXX-9876");

    let (status, _) = app
        .put("/api/users/profile/academic", &token, json!({"class_12_percentage": 104.0}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .put("/api/users/profile/family", &token, json!({"mother_phone": "555"}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/users/profile", &token).await;
    assert!(body["data"].get("aadhaar_encrypted").is_none());
    assert_eq!(body["data"]["aadhaar_verified"], true);
}

#[tokio::test]
async fn test_dashboard_statistics_and_achievements() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Kiran Das", "kiran@example.com").await;

    let (status, body) = app.get("/api/users/dashboard", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["coin_balance"], 75);
    assert_eq!(body["data"]["progress"]["registration_step"], 1);
    assert_eq!(body["data"]["latest_assessment"], Value::Null);

    let (_, body) = app.get("/api/users/statistics", &token).await;
    assert_eq!(body["data"]["assessments_taken"], 0);
    assert_eq!(body["data"]["achievements_unlocked"], 0);

    let (_, body) = app.get("/api/users/achievements", &token).await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 6);
    assert!(list.iter().all(|a| a["unlocked"] == false));
}
