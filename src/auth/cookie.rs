//! Cookie transport for the access/refresh token pair.
//!
//! After login or registration the tokens travel only in these cookies,
//! never in a response body or URL.

use axum::{
    http::{HeaderMap, header, header::SET_COOKIE},
    response::AppendHeaders,
};

use crate::jwt::{SignedToken, TokenPair};

/// Cookie name for the access token (short-lived, 15 minutes).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (long-lived, 7 days).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header. Empty values count as absent.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                let value = value.trim();
                return if value.is_empty() { None } else { Some(value) };
            }
        }
    }
    None
}

pub fn get_access_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, ACCESS_COOKIE_NAME)
}

pub fn get_refresh_token(headers: &HeaderMap) -> Option<&str> {
    get_cookie(headers, REFRESH_COOKIE_NAME)
}

fn build_cookie(name: &str, value: &str, max_age: u64, secure: bool) -> String {
    let secure = if secure { "; Secure" } else { "" };
    format!(
        "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}{}",
        name, value, max_age, secure
    )
}

/// `Set-Cookie` value carrying a new access token.
pub fn access_cookie(token: &SignedToken, secure: bool) -> String {
    build_cookie(ACCESS_COOKIE_NAME, &token.token, token.max_age, secure)
}

/// `Set-Cookie` value carrying a new refresh token.
pub fn refresh_cookie(token: &SignedToken, secure: bool) -> String {
    build_cookie(REFRESH_COOKIE_NAME, &token.token, token.max_age, secure)
}

/// `Set-Cookie` value deleting the named cookie.
pub fn expired_cookie(name: &str, secure: bool) -> String {
    build_cookie(name, "", 0, secure)
}

/// Both cookies, set in the same response.
pub fn set_auth_cookies(
    tokens: &TokenPair,
    secure: bool,
) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, access_cookie(&tokens.access, secure)),
        (SET_COOKIE, refresh_cookie(&tokens.refresh, secure)),
    ])
}

/// Delete both cookies (logout).
pub fn clear_auth_cookies(secure: bool) -> AppendHeaders<[(header::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, expired_cookie(ACCESS_COOKIE_NAME, secure)),
        (SET_COOKIE, expired_cookie(REFRESH_COOKIE_NAME, secure)),
    ])
}
