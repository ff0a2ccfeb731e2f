use axum::http::{Method, StatusCode};
use serde_json::json;

mod common;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn test_register_issues_token_and_registration_bonus() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Asha Rao", "asha@example.com").await;

    let (status, body) = app.get("/api/auth/profile", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "asha@example.com");
    assert_eq!(body["data"]["account_status"], "pending_verification");
    assert!(body["data"].get("password_hash").is_none());

    assert_eq!(app.coins(&token).await, 75);

    let outbox = app.state.email().outbox();
    assert_eq!(outbox.len(), 1);
    assert_eq!(outbox[0].to, "asha@example.com");
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_input() {
    let app = TestApp::new().await;
    app.register("Asha Rao", "asha@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "Asha", "email": "ASHA@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"name": "A", "email": "not-an-email", "password": "weak", "role": "college_administrator"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_login_lockout_after_five_failures() {
    let app = TestApp::new().await;
    app.register("Ravi Kumar", "ravi@example.com").await;

    let login = |password: &'static str| {
        app.request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ravi@example.com", "password": password})),
        )
    };

    for _ in 0..5 {
        let (status, body) = login("Wrong!Pass1").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    let (status, _) = login(PASSWORD).await;
    assert_eq!(status, StatusCode::LOCKED);
}

#[tokio::test]
async fn test_login_and_logout_revokes_session() {
    let app = TestApp::new().await;
    app.register("Meera Iyer", "meera@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "meera@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(body["data"]["user"]["last_login"].is_string());

    let (status, _) = app.post("/api/auth/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api/auth/profile", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid or expired token");
}

#[tokio::test]
async fn test_protected_route_without_token() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api/users/dashboard", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Access denied. No token provided.");
}

#[tokio::test]
async fn test_email_otp_round() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Kiran Das", "kiran@example.com").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/send-otp",
            None,
            Some(json!({"identifier": "kiran@example.com", "type": "email"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mail = app.state.email().outbox().pop().unwrap();
    let code: String = mail
        .body
        .split("<strong>")
        .nth(1)
        .unwrap()
        .chars()
        .take(6)
        .collect();

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({"identifier": "kiran@example.com", "type": "email", "otp": "000000"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid OTP. 2 attempts remaining");

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({"identifier": "kiran@example.com", "type": "email", "otp": code})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["account_updated"], true);

    let (_, body) = app.get("/api/auth/profile", &token).await;
    assert_eq!(body["data"]["email_verified"], true);
}

#[tokio::test]
async fn test_phone_otp_goes_to_sms() {
    let app = TestApp::new().await;
    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/send-otp",
            None,
            Some(json!({"identifier": "9876543210", "type": "phone"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let sent = app.state.sms().outbox();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "9876543210");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = TestApp::new().await;
    let (old_token, _) = app.register("Nisha Paul", "nisha@example.com").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({"email": "nisha@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({"email": "nobody@example.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let mail = app.state.email().outbox().pop().unwrap();
    let reset_token: String = mail
        .body
        .split("token=")
        .nth(1)
        .unwrap()
        .chars()
        .take_while(|c| c.is_ascii_hexdigit())
        .collect();
    assert_eq!(reset_token.len(), 64);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({"token": "deadbeef", "password": "N3w!Password"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired reset token");

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({"token": reset_token, "password": "N3w!Password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/profile", &old_token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nisha@example.com", "password": "N3w!Password"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_requires_current() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Arjun Mehta", "arjun@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/change-password",
            &token,
            json!({"current_password": "Wrong!Pass1", "new_password": "N3w!Password"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Current password is incorrect");

    let (status, _) = app
        .post(
            "/api/auth/change-password",
            &token,
            json!({"current_password": PASSWORD, "new_password": "N3w!Password"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_validate_and_refresh_token() {
    let app = TestApp::new().await;
    let (token, user_id) = app.register("Leela Nair", "leela@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/auth/validate-token",
            None,
            Some(json!({"token": token})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["id"], user_id.as_str());

    let (status, body) = app.post("/api/auth/refresh-token", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let fresh = body["data"]["token"].as_str().unwrap().to_string();
    assert_ne!(fresh, token);

    let (status, _) = app.get("/api/auth/profile", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/auth/profile", &fresh).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/validate-token",
            None,
            Some(json!({"token": "garbage.token.value"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_update_profile_and_delete_account() {
    let app = TestApp::new().await;
    let (token, _) = app.register("Dev Sharma", "dev@example.com").await;

    let (status, body) = app
        .put(
            "/api/auth/profile",
            &token,
            json!({"name": "Dev K Sharma", "college_name": "SRCC", "admission_year": 2024}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], "Dev K Sharma");
    assert_eq!(body["data"]["college_name"], "SRCC");

    let (status, _) = app.delete("/api/auth/account", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/auth/profile", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "dev@example.com", "password": PASSWORD})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "OK");
    assert_eq!(body["database"], "connected");

    let (status, body) = app.request(Method::GET, "/health/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");

    let (status, _) = app.request(Method::GET, "/health/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");
}
