#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use donorgate::{
    ServerConfig, create_app,
    db::{Database, seed_demo_accounts},
    jwt::JwtConfig,
    rate_limit::RateLimitConfig,
};
use tower::ServiceExt;

pub const JWT_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough";

/// Create a test app over a seeded in-memory database.
/// Returns (app, db, jwt_config) where jwt_config shares the app's secret.
pub async fn create_test_app() -> (Router, Database, JwtConfig) {
    create_test_app_with_limits(RateLimitConfig::permissive()).await
}

pub async fn create_test_app_with_limits(
    rate_limits: RateLimitConfig,
) -> (Router, Database, JwtConfig) {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");
    seed_demo_accounts(&db)
        .await
        .expect("Failed to seed test database");

    let config = ServerConfig {
        db: db.clone(),
        jwt_secret: JWT_SECRET.to_vec(),
        secure_cookies: false,
        rate_limits,
    };
    (create_app(&config), db, JwtConfig::new(JWT_SECRET))
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn post_with_cookie(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// All Set-Cookie header values of a response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The full Set-Cookie value for the named cookie, if the response sets it.
pub fn find_set_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&prefix))
}

/// Just the value part of the named cookie.
pub fn cookie_value(response: &Response<Body>, name: &str) -> Option<String> {
    let cookie = find_set_cookie(response, name)?;
    let value = cookie.split(';').next()?.split_once('=')?.1;
    Some(value.to_string())
}

/// Log in through the API and return (access_token, refresh_token).
pub async fn login(app: &Router, email: &str, password: &str) -> (String, String) {
    let body = format!(r#"{{"email": "{}", "password": "{}"}}"#, email, password);
    let response = send(app, post_json("/auth/login", &body)).await;
    assert_eq!(response.status(), 200, "login failed for {}", email);

    let access = cookie_value(&response, "accessToken").expect("no access cookie");
    let refresh = cookie_value(&response, "refreshToken").expect("no refresh cookie");
    (access, refresh)
}
