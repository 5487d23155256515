//! Routing gate for the protected sections of the site.
//!
//! Every request whose path falls under a protected prefix is checked here
//! before any handler runs:
//!
//! - no access token, or one that fails verification: redirect to the login
//!   page with the original path in `redirect`
//! - valid token but the section belongs to another role: redirect to the
//!   generic dashboard
//! - otherwise the request passes through untouched
//!
//! The gate never consults the refresh token. An expired access token always
//! means a trip to the login page; clients are expected to call
//! `POST /auth/refresh` before the access token runs out.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::debug;

use crate::auth::get_access_token;
use crate::db::Role;
use crate::jwt::JwtConfig;

/// Login page the gate sends unauthenticated visitors to.
pub const LOGIN_PATH: &str = "/auth/login";

/// Landing page for authenticated users who strayed into another role's section.
pub const DASHBOARD_PATH: &str = "/dashboard";

/// A protected path prefix and the role it belongs to (`None`: any role).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedSection {
    pub prefix: &'static str,
    pub role: Option<Role>,
}

pub const PROTECTED_SECTIONS: &[ProtectedSection] = &[
    ProtectedSection {
        prefix: DASHBOARD_PATH,
        role: None,
    },
    ProtectedSection {
        prefix: "/donor",
        role: Some(Role::Donor),
    },
    ProtectedSection {
        prefix: "/ngo",
        role: Some(Role::Ngo),
    },
    ProtectedSection {
        prefix: "/admin",
        role: Some(Role::Admin),
    },
];

/// Outcome of running a request through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    RedirectToLogin { return_to: String },
    RedirectToDashboard,
}

impl GateDecision {
    /// Location header value for redirects.
    pub fn location(&self) -> Option<String> {
        match self {
            GateDecision::Allow => None,
            GateDecision::RedirectToLogin { return_to } => Some(login_location(return_to)),
            GateDecision::RedirectToDashboard => Some(DASHBOARD_PATH.to_string()),
        }
    }
}

/// `true` if `path` is `prefix` itself or lies below it (segment-wise).
fn is_under(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The protected section `path` belongs to, if any.
pub fn protected_section(path: &str) -> Option<&'static ProtectedSection> {
    PROTECTED_SECTIONS
        .iter()
        .find(|section| is_under(path, section.prefix))
}

/// Decide what to do with a request for `path` carrying `access_token`.
pub fn evaluate(path: &str, access_token: Option<&str>, jwt: &JwtConfig) -> GateDecision {
    let Some(section) = protected_section(path) else {
        return GateDecision::Allow;
    };

    let login = || GateDecision::RedirectToLogin {
        return_to: path.to_string(),
    };

    let Some(token) = access_token else {
        return login();
    };

    let Some(claims) = jwt.verify_access(token) else {
        return login();
    };

    match section.role {
        Some(required) if claims.identity.role != required => GateDecision::RedirectToDashboard,
        _ => GateDecision::Allow,
    }
}

/// Build `/auth/login?redirect=<path>`.
fn login_location(return_to: &str) -> String {
    format!("{}?redirect={}", LOGIN_PATH, encode_query_value(return_to))
}

/// Percent-encode characters that would break a query parameter value.
/// Slashes and well-formed `%XX` escapes are kept so the path stays readable;
/// any other `%` is encoded.
fn encode_query_value(value: &str) -> String {
    let bytes = value.as_bytes();
    let mut encoded = String::with_capacity(value.len());
    for (i, &byte) in bytes.iter().enumerate() {
        match byte {
            b'A'..=b'Z'
            | b'a'..=b'z'
            | b'0'..=b'9'
            | b'-'
            | b'.'
            | b'_'
            | b'~'
            | b'/'
            | b':'
            | b'@'
            | b'!'
            | b'$'
            | b'\''
            | b'('
            | b')'
            | b'*'
            | b','
            | b';' => encoded.push(byte as char),
            b'%' if starts_escape(&bytes[i + 1..]) => encoded.push('%'),
            other => encoded.push_str(&format!("%{:02X}", other)),
        }
    }
    encoded
}

/// `true` if `rest` begins with two hex digits.
fn starts_escape(rest: &[u8]) -> bool {
    matches!(rest, [a, b, ..] if a.is_ascii_hexdigit() && b.is_ascii_hexdigit())
}

/// Middleware applying [`evaluate`] to every request.
pub async fn protected_route_gate(
    State(jwt): State<Arc<JwtConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path();
    let decision = evaluate(path, get_access_token(request.headers()), &jwt);

    match decision.location() {
        None => next.run(request).await,
        Some(location) => {
            debug!(path = %path, location = %location, "Protected route redirect");
            Redirect::temporary(&location).into_response()
        }
    }
}
