use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header::RETRY_AFTER, HeaderName, HeaderValue, Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use parking_lot::Mutex;

use crate::config::{env_bool, env_parse};
use crate::response::AppError;

const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");

const MINUTE_MS: u64 = 60 * 1000;
const HOUR_MS: u64 = 60 * MINUTE_MS;

static LIMITER: OnceLock<RateLimiter> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub scope: &'static str,
    pub window_ms: u64,
    pub max: u64,
    pub message: &'static str,
}

const GENERAL: Policy = Policy {
    scope: "api",
    window_ms: 15 * MINUTE_MS,
    max: 100,
    message: "Too many requests from this IP, please try again later",
};

/// Route-specific policy for a request, checked in addition to the general one.
pub fn policy_for(method: &Method, path: &str) -> Option<Policy> {
    let policy = |scope: &'static str, window_ms: u64, max: u64, message: &'static str| {
        Some(Policy {
            scope,
            window_ms,
            max,
            message,
        })
    };
    let is_post = method == Method::POST;

    match path {
        "/api/auth/login" => policy(
            "login",
            15 * MINUTE_MS,
            5,
            "Too many login attempts, please try again after 15 minutes",
        ),
        "/api/auth/register" => policy(
            "register",
            HOUR_MS,
            3,
            "Too many accounts created from this IP, please try again after an hour",
        ),
        "/api/auth/forgot-password" => policy(
            "forgot_password",
            HOUR_MS,
            5,
            "Too many password reset attempts, please try again after an hour",
        ),
        "/api/auth/send-otp" => policy(
            "send_otp",
            10 * MINUTE_MS,
            5,
            "Too many OTP requests, please try again after 10 minutes",
        ),
        "/api/auth/verify-otp" => policy(
            "verify_otp",
            10 * MINUTE_MS,
            10,
            "Too many OTP verification attempts, please try again later",
        ),
        "/api/forum/posts" if is_post => policy(
            "forum_post",
            HOUR_MS,
            10,
            "Too many posts created, please try again after an hour",
        ),
        "/api/assessment/submit" if is_post => policy(
            "assessment_submit",
            24 * HOUR_MS,
            5,
            "Too many assessment submissions, please try again tomorrow",
        ),
        "/api/puzzles/attempt" if is_post => policy(
            "puzzle_attempt",
            HOUR_MS,
            50,
            "Too many puzzle attempts, please try again after an hour",
        ),
        "/api/colleges/search" => policy(
            "college_search",
            10 * MINUTE_MS,
            100,
            "Too many search requests, please try again later",
        ),
        _ if is_post && path.starts_with("/api/forum/posts/") && path.ends_with("/comments") => {
            policy(
                "forum_comment",
                HOUR_MS,
                20,
                "Too many comments, please try again after an hour",
            )
        }
        _ if path.starts_with("/api/admin/") || path == "/api/admin" => policy(
            "admin",
            HOUR_MS,
            100,
            "Too many admin requests, please try again later",
        ),
        _ => None,
    }
}

fn general_policy() -> Policy {
    Policy {
        window_ms: env_parse("RATE_LIMIT_WINDOW_MS").unwrap_or(GENERAL.window_ms),
        max: env_parse("RATE_LIMIT_MAX").unwrap_or(GENERAL.max),
        ..GENERAL
    }
}

pub async fn rate_limit_middleware(req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path();
    if !(path == "/api" || path.starts_with("/api/")) || should_skip(&req) {
        return next.run(req).await;
    }

    let ip = extract_client_ip(&req).unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
    let limiter = LIMITER.get_or_init(RateLimiter::new);
    let now = now_ms();

    let mut reported = limiter.check(general_policy(), ip, now);
    if !reported.allowed {
        return reject(reported);
    }
    if let Some(policy) = policy_for(req.method(), path) {
        let check = limiter.check(policy, ip, now);
        if !check.allowed {
            return reject(check);
        }
        reported = check;
    }

    let mut res = next.run(req).await;
    apply_rate_limit_headers(&mut res, &reported);
    res
}

fn reject(check: RateLimitCheck) -> Response {
    tracing::warn!(scope = check.scope, "rate limit exceeded");
    let mut res = AppError::too_many_requests(check.message).into_response();
    apply_rate_limit_headers(&mut res, &check);
    res
}

fn apply_rate_limit_headers(res: &mut Response, check: &RateLimitCheck) {
    let headers = res.headers_mut();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(check.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(check.remaining));
    headers.insert(RATE_LIMIT_RESET, HeaderValue::from(check.reset_after_seconds));
    if !check.allowed {
        headers.insert(RETRY_AFTER, HeaderValue::from(check.reset_after_seconds));
    }
}

fn should_skip(req: &Request<Body>) -> bool {
    if matches!(std::env::var("NODE_ENV").ok().as_deref(), Some("test")) {
        return true;
    }
    extract_client_ip(req)
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Key {
    scope: &'static str,
    ip: IpAddr,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    window_start_ms: u64,
    hits: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitCheck {
    pub scope: &'static str,
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_after_seconds: u64,
    pub message: &'static str,
}

/// Fixed-window counters keyed by policy scope and client address.
#[derive(Debug, Default)]
pub struct RateLimiter {
    entries: Mutex<HashMap<Key, Entry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&self, policy: Policy, ip: IpAddr, now_ms: u64) -> RateLimitCheck {
        let mut entries = self.entries.lock();

        // Stale windows of this scope are dropped as a side effect.
        entries.retain(|key, entry| {
            key.scope != policy.scope || now_ms.saturating_sub(entry.window_start_ms) < policy.window_ms
        });

        let entry = entries
            .entry(Key {
                scope: policy.scope,
                ip,
            })
            .or_insert(Entry {
                window_start_ms: now_ms,
                hits: 0,
            });
        entry.hits = entry.hits.saturating_add(1);

        let allowed = entry.hits <= policy.max;
        let reset_after_ms = policy
            .window_ms
            .saturating_sub(now_ms.saturating_sub(entry.window_start_ms));

        RateLimitCheck {
            scope: policy.scope,
            allowed,
            limit: policy.max,
            remaining: policy.max.saturating_sub(entry.hits),
            reset_after_seconds: reset_after_ms.div_ceil(1000),
            message: policy.message,
        }
    }
}

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

fn extract_client_ip(req: &Request<Body>) -> Option<IpAddr> {
    if env_bool("TRUST_PROXY").unwrap_or(false) {
        if let Some(ip) = extract_x_forwarded_for(req) {
            return Some(ip);
        }
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

fn extract_x_forwarded_for(req: &Request<Body>) -> Option<IpAddr> {
    let raw = req
        .headers()
        .get(HeaderName::from_static("x-forwarded-for"))?
        .to_str()
        .ok()?;
    raw.split(',').next()?.trim().parse::<IpAddr>().ok()
}
