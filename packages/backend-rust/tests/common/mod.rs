#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use career_algo::ScoringMode;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use career_navigator_backend::config::Config;
use career_navigator_backend::services::email_provider::EmailService;
use career_navigator_backend::services::sms::SmsService;
use career_navigator_backend::state::AppState;
use career_navigator_backend::{build_router, build_state};

pub const PASSWORD: &str = "Str0ng!Pass";

pub fn set_test_env() {
    std::env::set_var("NODE_ENV", "test");
    std::env::set_var("JWT_SECRET", "integration-test-secret");
    std::env::set_var("BCRYPT_ROUNDS", "4");
    std::env::set_var("ENCRYPTION_KEY", "0123456789abcdef0123456789abcdef0123456789abcdef0123456789abcdef");
}

pub fn test_config() -> Config {
    Config {
        scoring_mode: ScoringMode::Derived,
        ..Config::in_memory()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        set_test_env();
        let frontend_url = config.frontend_url.clone();
        let state = build_state(config)
            .await
            .unwrap()
            .with_messaging(EmailService::mock(&frontend_url), SmsService::mock());
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers a student and returns `(token, user_id)`.
    pub async fn register(&self, name: &str, email: &str) -> (String, String) {
        self.register_as(name, email, "student").await
    }

    pub async fn register_as(&self, name: &str, email: &str, role: &str) -> (String, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({
                    "name": name,
                    "email": email,
                    "password": PASSWORD,
                    "role": role,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let token = body["data"]["token"].as_str().unwrap().to_string();
        let user_id = body["data"]["user"]["id"].as_str().unwrap().to_string();
        (token, user_id)
    }

    /// Registers a user and promotes them to college administrator.
    pub async fn admin(&self, email: &str) -> (String, String) {
        let (token, user_id) = self.register("Admin User", email).await;
        sqlx::query(r#"UPDATE "users" SET "role" = 'college_administrator' WHERE "id" = ?"#)
            .bind(&user_id)
            .execute(self.state.pool())
            .await
            .unwrap();
        (token, user_id)
    }

    pub async fn coins(&self, token: &str) -> i64 {
        let (_, body) = self.get("/api/coins/balance", token).await;
        body["data"]["balance"].as_i64().unwrap()
    }
}
