//! Tests for the authentication endpoints.
//!
//! Tests cover:
//! - Login with seeded accounts (success, wrong password, unknown email)
//! - Registration of donor and NGO accounts
//! - Logout clearing both cookies
//! - Refresh minting a new access token without rotating the refresh token
//! - The `/auth/me` identity endpoint
//! - Rate limiting of login attempts

mod common;

use axum::http::StatusCode;
use common::*;
use donorgate::{
    db::Role,
    jwt::{ACCESS_TOKEN_LIFETIME, Identity, REFRESH_TOKEN_LIFETIME, TokenType},
    rate_limit::RateLimitConfig,
};
use governor::Quota;
use std::num::NonZeroU32;
use std::time::{SystemTime, UNIX_EPOCH};

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

// =============================================================================
// Login
// =============================================================================

#[tokio::test]
async fn test_login_success_sets_both_cookies() {
    let (app, _db, jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/login",
            r#"{"email": "donor@example.com", "password": "donor123"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let access_cookie = find_set_cookie(&response, "accessToken").unwrap();
    assert!(access_cookie.contains("HttpOnly"));
    assert!(access_cookie.contains("SameSite=Lax"));
    assert!(access_cookie.contains("Path=/"));
    assert!(access_cookie.contains("Max-Age=900"));
    assert!(!access_cookie.contains("Secure"));

    let refresh_cookie = find_set_cookie(&response, "refreshToken").unwrap();
    assert!(refresh_cookie.contains("HttpOnly"));
    assert!(refresh_cookie.contains("Max-Age=604800"));

    let access = cookie_value(&response, "accessToken").unwrap();
    let claims = jwt.verify_access(&access).unwrap();
    assert_eq!(claims.identity.email, "donor@example.com");
    assert_eq!(claims.identity.role, Role::Donor);
    assert_eq!(claims.identity.ngo_id, None);

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "donor@example.com");
    assert_eq!(json["user"]["role"], "DONOR");
    assert_eq!(json["user"]["id"], claims.identity.user_id.as_str());

    // Tokens travel only in cookies
    let body = json.to_string();
    assert!(!body.contains(&access));
}

#[tokio::test]
async fn test_login_ngo_carries_ngo_id() {
    let (app, _db, jwt) = create_test_app().await;

    let (access, refresh) = login(&app, "hope@ngo.com", "ngo123").await;

    let access_claims = jwt.verify_access(&access).unwrap();
    assert_eq!(access_claims.identity.role, Role::Ngo);
    assert!(access_claims.identity.ngo_id.is_some());

    assert_eq!(access_claims.token_type, TokenType::Access);
    let refresh_claims = jwt.verify_refresh(&refresh).unwrap();
    assert_eq!(refresh_claims.identity, access_claims.identity);
    assert_eq!(
        refresh_claims.exp - refresh_claims.iat,
        REFRESH_TOKEN_LIFETIME.as_secs()
    );
}

#[tokio::test]
async fn test_login_email_is_case_insensitive() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/login",
            r#"{"email": " Admin@Example.com ", "password": "admin123"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/login",
            r#"{"email": "donor@example.com", "password": "wrong"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());

    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_unknown_email_looks_like_wrong_password() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/login",
            r#"{"email": "nobody@example.com", "password": "donor123"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());

    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid email or password");
}

#[tokio::test]
async fn test_login_validation_failure() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json("/auth/login", r#"{"email": "not-an-email"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Validation failed");
    let fields: Vec<&str> = json["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password"]);
}

#[tokio::test]
async fn test_login_rate_limited() {
    let quota = Quota::per_minute(NonZeroU32::new(2).unwrap());
    let (app, _db, _jwt) =
        create_test_app_with_limits(RateLimitConfig::with_quotas(quota, quota, false)).await;

    let body = r#"{"email": "donor@example.com", "password": "wrong"}"#;
    for _ in 0..2 {
        let response = send(&app, post_json("/auth/login", body)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    let response = send(&app, post_json("/auth/login", body)).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Other endpoints are unaffected
    let response = send(&app, post_with_cookie("/auth/logout", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_register_donor() {
    let (app, db, jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/register",
            r#"{"name": "Alice", "email": "Alice@Example.com", "password": "secret1", "role": "DONOR"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let access = cookie_value(&response, "accessToken").unwrap();
    assert!(cookie_value(&response, "refreshToken").is_some());
    let claims = jwt.verify_access(&access).unwrap();
    assert_eq!(claims.identity.email, "alice@example.com");
    assert_eq!(claims.identity.role, Role::Donor);

    let json = body_json(response).await;
    assert_eq!(json["user"]["name"], "Alice");
    assert_eq!(json["user"]["email"], "alice@example.com");
    assert!(json["user"].get("ngoId").is_none());

    let stored = db
        .users()
        .get_by_uuid(&claims.identity.user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.role, Role::Donor);

    // The new account can log in
    login(&app, "alice@example.com", "secret1").await;
}

#[tokio::test]
async fn test_register_ngo_creates_profile() {
    let (app, db, jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/register",
            r#"{"name": "Food Bank", "email": "bank@ngo.org", "password": "secret1", "role": "NGO",
                "ngo": {"name": "City Food Bank", "description": "Meals"}}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let access = cookie_value(&response, "accessToken").unwrap();
    let claims = jwt.verify_access(&access).unwrap();
    assert_eq!(claims.identity.role, Role::Ngo);
    let ngo_id = claims.identity.ngo_id.clone().unwrap();

    let json = body_json(response).await;
    assert_eq!(json["user"]["ngoId"], ngo_id.as_str());

    let (verified,): (bool,) = sqlx::query_as("SELECT verified FROM ngos WHERE uuid = ?")
        .bind(&ngo_id)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert!(!verified);
}

#[tokio::test]
async fn test_register_duplicate_email() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/register",
            r#"{"name": "Another", "email": "DONOR@example.com", "password": "secret1", "role": "DONOR"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());

    let json = body_json(response).await;
    assert_eq!(json["error"], "User with this email already exists");
}

#[tokio::test]
async fn test_register_rejects_admin_role() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/register",
            r#"{"name": "Mallory", "email": "mallory@example.com", "password": "secret1", "role": "ADMIN"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_register_validation_failure() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(
        &app,
        post_json(
            "/auth/register",
            r#"{"name": "A", "email": "bad", "password": "123", "role": "DONOR"}"#,
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["details"].as_array().unwrap().len(), 3);
}

// =============================================================================
// Logout
// =============================================================================

#[tokio::test]
async fn test_logout_clears_both_cookies() {
    let (app, _db, _jwt) = create_test_app().await;
    let (access, refresh) = login(&app, "donor@example.com", "donor123").await;

    let cookie = format!("accessToken={}; refreshToken={}", access, refresh);
    let response = send(&app, post_with_cookie("/auth/logout", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let access_cookie = find_set_cookie(&response, "accessToken").unwrap();
    assert!(access_cookie.starts_with("accessToken=;"));
    assert!(access_cookie.contains("Max-Age=0"));
    let refresh_cookie = find_set_cookie(&response, "refreshToken").unwrap();
    assert!(refresh_cookie.starts_with("refreshToken=;"));
    assert!(refresh_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_logout_without_session() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(&app, post_with_cookie("/auth/logout", "")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(set_cookies(&response).len(), 2);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Logout successful");
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_mints_new_access_token() {
    let (app, _db, jwt) = create_test_app().await;
    let identity = Identity {
        user_id: "uuid-ngo".to_string(),
        email: "hope@ngo.com".to_string(),
        role: Role::Ngo,
        ngo_id: Some("ngo-1".to_string()),
    };

    let issued = now() - 60;
    let old_access = jwt
        .sign_at(&identity, TokenType::Access, ACCESS_TOKEN_LIFETIME, issued)
        .unwrap();
    let refresh = jwt
        .sign_at(&identity, TokenType::Refresh, REFRESH_TOKEN_LIFETIME, issued)
        .unwrap();

    let cookie = format!(
        "accessToken={}; refreshToken={}",
        old_access.token, refresh.token
    );
    let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Only the access cookie is rewritten
    assert!(find_set_cookie(&response, "refreshToken").is_none());
    let access_cookie = find_set_cookie(&response, "accessToken").unwrap();
    assert!(access_cookie.contains("Max-Age=900"));

    let new_access = cookie_value(&response, "accessToken").unwrap();
    let new_claims = jwt.verify_access(&new_access).unwrap();
    assert_ne!(new_claims.exp, old_access.expires_at);
    assert_eq!(new_claims.identity, identity);

    let json = body_json(response).await;
    assert_eq!(json["message"], "Token refreshed successfully");
}

#[tokio::test]
async fn test_refresh_token_is_reusable() {
    let (app, _db, _jwt) = create_test_app().await;
    let (_access, refresh) = login(&app, "donor@example.com", "donor123").await;

    let cookie = format!("refreshToken={}", refresh);
    for _ in 0..3 {
        let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

#[tokio::test]
async fn test_refresh_without_token() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(&app, post_with_cookie("/auth/refresh", "foo=bar")).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(set_cookies(&response).is_empty());

    let json = body_json(response).await;
    assert_eq!(json["error"], "No refresh token provided");
}

#[tokio::test]
async fn test_refresh_with_invalid_token_clears_cookies() {
    let (app, _db, jwt) = create_test_app().await;
    let identity = Identity {
        user_id: "uuid-donor".to_string(),
        email: "donor@example.com".to_string(),
        role: Role::Donor,
        ngo_id: None,
    };
    let expired = jwt
        .sign_at(
            &identity,
            TokenType::Refresh,
            REFRESH_TOKEN_LIFETIME,
            now() - REFRESH_TOKEN_LIFETIME.as_secs(),
        )
        .unwrap();

    for token in ["garbage", expired.token.as_str()] {
        let cookie = format!("refreshToken={}", token);
        let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let cleared = find_set_cookie(&response, "refreshToken").unwrap();
        assert!(cleared.contains("Max-Age=0"));
        assert!(find_set_cookie(&response, "accessToken").is_some());

        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid refresh token");
    }
}

#[tokio::test]
async fn test_refresh_rejects_access_token() {
    let (app, _db, jwt) = create_test_app().await;
    let (access, _refresh) = login(&app, "donor@example.com", "donor123").await;

    // An access token in the refresh cookie must not extend the session
    let cookie = format!("refreshToken={}", access);
    let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cleared = find_set_cookie(&response, "accessToken").unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid refresh token");

    // Still valid as what it is
    assert!(jwt.verify_access(&access).is_some());
}

#[tokio::test]
async fn test_refreshed_token_is_an_access_token() {
    let (app, _db, jwt) = create_test_app().await;
    let (_access, refresh) = login(&app, "donor@example.com", "donor123").await;

    let cookie = format!("refreshToken={}", refresh);
    let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let new_access = cookie_value(&response, "accessToken").unwrap();
    let claims = jwt.verify_access(&new_access).unwrap();
    assert_eq!(claims.token_type, TokenType::Access);
    assert_eq!(claims.exp - claims.iat, ACCESS_TOKEN_LIFETIME.as_secs());

    // The minted token cannot itself be used to refresh
    let cookie = format!("refreshToken={}", new_access);
    let response = send(&app, post_with_cookie("/auth/refresh", &cookie)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Current identity
// =============================================================================

#[tokio::test]
async fn test_me_returns_claims() {
    let (app, _db, _jwt) = create_test_app().await;
    let (access, _refresh) = login(&app, "admin@example.com", "admin123").await;

    let cookie = format!("accessToken={}", access);
    let response = send(&app, get("/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["user"]["email"], "admin@example.com");
    assert_eq!(json["user"]["role"], "ADMIN");
    assert!(json["user"]["exp"].as_u64().is_some());
}

#[tokio::test]
async fn test_me_without_token_is_401() {
    let (app, _db, _jwt) = create_test_app().await;

    let response = send(&app, get("/auth/me", None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_refresh_token_as_access_token() {
    let (app, _db, _jwt) = create_test_app().await;
    let (_access, refresh) = login(&app, "donor@example.com", "donor123").await;

    let cookie = format!("accessToken={}", refresh);
    let response = send(&app, get("/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_refresh_cookie_alone() {
    let (app, _db, _jwt) = create_test_app().await;
    let (_access, refresh) = login(&app, "donor@example.com", "donor123").await;

    let cookie = format!("refreshToken={}", refresh);
    let response = send(&app, get("/auth/me", Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
