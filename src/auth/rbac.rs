//! Role-based access checks.
//!
//! Two outcomes must stay distinct: 401 when there is no identity at all,
//! 403 when the identity is valid but its role is not allowed. Ownership of
//! individual resources (an NGO editing only its own requests) is left to
//! the handler, which compares `ngo_id` against the resource owner.

use axum::response::{IntoResponse, Response};

use crate::api::ApiError;
use crate::db::Role;
use crate::jwt::Identity;

pub const UNAUTHORIZED_MESSAGE: &str = "Unauthorized";
pub const FORBIDDEN_MESSAGE: &str = "You do not have permission to access this resource";

/// True iff an identity is present and its role is in `allowed`.
pub fn require_role(identity: Option<&Identity>, allowed: &[Role]) -> bool {
    identity.is_some_and(|identity| allowed.contains(&identity.role))
}

pub fn unauthorized_response(message: &str) -> Response {
    ApiError::unauthorized(message).into_response()
}

pub fn forbidden_response(message: &str) -> Response {
    ApiError::forbidden(message).into_response()
}

/// Returns the response to send if the caller may not proceed, `None` if it may.
pub fn assert_role(identity: Option<&Identity>, allowed: &[Role]) -> Option<Response> {
    let Some(identity) = identity else {
        return Some(unauthorized_response(UNAUTHORIZED_MESSAGE));
    };

    if !allowed.contains(&identity.role) {
        tracing::debug!(
            user_id = %identity.user_id,
            role = %identity.role,
            "Role not permitted"
        );
        return Some(forbidden_response(FORBIDDEN_MESSAGE));
    }

    None
}
