//! Axum extractors for authentication.

use std::convert::Infallible;
use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts, response::Response};

use super::cookie::get_access_token;
use super::rbac::{UNAUTHORIZED_MESSAGE, assert_role, unauthorized_response};
use super::state::HasAuthBackend;
use crate::db::Role;
use crate::jwt::Claims;

/// Role set an [`Auth`] extractor accepts.
pub trait RoleConstraint {
    const ALLOWED: &'static [Role];
}

/// Any authenticated identity.
pub struct AnyRole;

impl RoleConstraint for AnyRole {
    const ALLOWED: &'static [Role] = &[Role::Donor, Role::Ngo, Role::Admin];
}

pub struct DonorOnly;

impl RoleConstraint for DonorOnly {
    const ALLOWED: &'static [Role] = &[Role::Donor];
}

pub struct NgoOnly;

impl RoleConstraint for NgoOnly {
    const ALLOWED: &'static [Role] = &[Role::Ngo];
}

pub struct AdminOnly;

impl RoleConstraint for AdminOnly {
    const ALLOWED: &'static [Role] = &[Role::Admin];
}

/// Verified claims of the request's access token, if any.
fn current_claims<S: HasAuthBackend>(parts: &Parts, state: &S) -> Option<Claims> {
    get_access_token(&parts.headers).and_then(|token| state.jwt().verify_access(token))
}

/// Optional authentication - never rejects.
pub struct CurrentUser(pub Option<Claims>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: HasAuthBackend + Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(current_claims(parts, state)))
    }
}

/// Requires a valid access token whose role satisfies `C`.
/// Rejects with 401 (no valid token) or 403 (role not allowed) JSON.
pub struct Auth<C: RoleConstraint = AnyRole> {
    pub claims: Claims,
    _constraint: PhantomData<fn() -> C>,
}

impl<S, C> FromRequestParts<S> for Auth<C>
where
    S: HasAuthBackend + Send + Sync,
    C: RoleConstraint,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let claims = current_claims(parts, state);

        if let Some(rejection) = assert_role(claims.as_ref().map(|c| &c.identity), C::ALLOWED) {
            return Err(rejection);
        }

        // assert_role only passes when an identity is present
        claims
            .map(|claims| Auth {
                claims,
                _constraint: PhantomData,
            })
            .ok_or_else(|| unauthorized_response(UNAUTHORIZED_MESSAGE))
    }
}
