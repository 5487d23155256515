//! Cookie-carried JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (15 min) checked on every
//! request, and long-lived refresh tokens (7 days) accepted only by the
//! refresh endpoint. Both are stateless; nothing is stored server side.

mod cookie;
mod extractors;
mod password;
mod rbac;
mod state;

pub use cookie::{
    ACCESS_COOKIE_NAME, REFRESH_COOKIE_NAME, access_cookie, clear_auth_cookies, expired_cookie,
    get_access_token, get_cookie, get_refresh_token, refresh_cookie, set_auth_cookies,
};
pub use extractors::{AdminOnly, AnyRole, Auth, CurrentUser, DonorOnly, NgoOnly, RoleConstraint};
pub use password::{PasswordError, hash_password, verify_dummy_password, verify_password};
pub use rbac::{
    FORBIDDEN_MESSAGE, UNAUTHORIZED_MESSAGE, assert_role, forbidden_response, require_role,
    unauthorized_response,
};
pub use state::HasAuthBackend;
