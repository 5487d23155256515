//! Authentication endpoints.
//!
//! - POST `/login` - Check credentials, set both cookies
//! - POST `/register` - Create an account, set both cookies
//! - POST `/logout` - Clear both cookies
//! - POST `/refresh` - Mint a new access token from the refresh token
//! - GET `/me` - Identity carried by the current access token

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ApiError, FieldError, ResultExt};
use crate::auth::{
    AnyRole, Auth, access_cookie, clear_auth_cookies, get_refresh_token, hash_password,
    set_auth_cookies, verify_dummy_password, verify_password,
};
use crate::db::{Database, NewNgo, Role, User};
use crate::impl_has_auth_backend;
use crate::jwt::{Claims, Identity, JwtConfig};
use crate::rate_limit::{RateLimitConfig, rate_limit_login, rate_limit_register};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

#[derive(Clone)]
pub struct AuthState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
    pub secure_cookies: bool,
    pub rate_limits: Arc<RateLimitConfig>,
}

impl_has_auth_backend!(AuthState);

pub fn router(state: AuthState) -> Router {
    let login_router = Router::new()
        .route("/login", post(login))
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_login,
        ))
        .with_state(state.clone());

    let register_router = Router::new()
        .route("/register", post(register))
        .layer(middleware::from_fn_with_state(
            state.rate_limits.clone(),
            rate_limit_register,
        ))
        .with_state(state.clone());

    Router::new()
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .with_state(state)
        .merge(login_router)
        .merge(register_router)
}

#[derive(Deserialize)]
struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
}

#[derive(Deserialize)]
struct RegisterRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    role: String,
    ngo: Option<NgoRequest>,
}

#[derive(Deserialize)]
struct NgoRequest {
    #[serde(default)]
    name: String,
    description: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UserResponse {
    id: String,
    name: String,
    email: String,
    role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    ngo_id: Option<String>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.uuid.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            ngo_id: user.ngo_uuid.clone(),
        }
    }
}

#[derive(Serialize)]
struct AuthResponse {
    message: &'static str,
    user: UserResponse,
}

#[derive(Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Serialize)]
struct MeResponse {
    user: Claims,
}

fn identity_for(user: &User) -> Identity {
    Identity {
        user_id: user.uuid.clone(),
        email: user.email.clone(),
        role: user.role,
        ngo_id: user.ngo_uuid.clone(),
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Loose address check: one `@`, a non-empty local part and a dotted domain.
fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

fn validate_login(payload: &LoginRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();
    if !is_valid_email(payload.email.trim()) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if payload.password.is_empty() {
        errors.push(FieldError::new("password", "Password is required"));
    }
    errors
}

/// Validated registration input.
struct Registration {
    name: String,
    email: String,
    password: String,
    ngo: Option<NgoRequest>,
}

fn validate_register(payload: RegisterRequest) -> Result<Registration, Vec<FieldError>> {
    let mut errors = Vec::new();

    let name = payload.name.trim().to_string();
    if name.chars().count() < 2 {
        errors.push(FieldError::new("name", "Name must be at least 2 characters"));
    }
    if !is_valid_email(payload.email.trim()) {
        errors.push(FieldError::new("email", "Invalid email address"));
    }
    if payload.password.chars().count() < 6 {
        errors.push(FieldError::new(
            "password",
            "Password must be at least 6 characters",
        ));
    }

    let ngo = match payload.role.parse::<Role>() {
        Ok(Role::Donor) => None,
        Ok(Role::Ngo) => match payload.ngo {
            Some(ngo) if ngo.name.trim().chars().count() >= 2 => Some(ngo),
            Some(_) => {
                errors.push(FieldError::new(
                    "ngo.name",
                    "NGO name must be at least 2 characters",
                ));
                None
            }
            None => {
                errors.push(FieldError::new(
                    "ngo",
                    "NGO details are required for NGO accounts",
                ));
                None
            }
        },
        Ok(Role::Admin) => {
            errors.push(FieldError::new(
                "role",
                "Administrator accounts cannot be self-registered",
            ));
            None
        }
        Err(_) => {
            errors.push(FieldError::new("role", "Role must be DONOR or NGO"));
            None
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Registration {
        name,
        email: normalize_email(&payload.email),
        password: payload.password,
        ngo,
    })
}

async fn login(
    State(state): State<AuthState>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let errors = validate_login(&payload);
    if !errors.is_empty() {
        return Err(ApiError::validation(errors));
    }

    let email = normalize_email(&payload.email);
    let Some(credentials) = state
        .db
        .users()
        .get_credentials_by_email(&email)
        .await
        .db_err("Failed to look up user")?
    else {
        verify_dummy_password(payload.password)
            .await
            .internal_err("Failed to verify password")?;
        debug!(email = %email, "Login for unknown email");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    };

    let valid = verify_password(payload.password, credentials.password_hash)
        .await
        .internal_err("Failed to verify password")?;
    if !valid {
        debug!(email = %email, "Login with wrong password");
        return Err(ApiError::unauthorized(INVALID_CREDENTIALS));
    }

    let user = credentials.user;
    let tokens = state
        .jwt
        .issue_pair(&identity_for(&user))
        .internal_err("Failed to generate token")?;

    info!(user_id = %user.uuid, role = %user.role, "User logged in");

    Ok((
        StatusCode::OK,
        set_auth_cookies(&tokens, state.secure_cookies),
        Json(AuthResponse {
            message: "Login successful",
            user: UserResponse::from(&user),
        }),
    ))
}

async fn register(
    State(state): State<AuthState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let registration = validate_register(payload).map_err(ApiError::validation)?;

    let exists = state
        .db
        .users()
        .email_exists(&registration.email)
        .await
        .db_err("Failed to check email")?;
    if exists {
        return Err(ApiError::bad_request("User with this email already exists"));
    }

    let password_hash = hash_password(registration.password)
        .await
        .internal_err("Failed to hash password")?;

    let uuid = uuid::Uuid::new_v4().to_string();
    let created = match &registration.ngo {
        Some(ngo) => {
            let ngo = NewNgo {
                uuid: uuid::Uuid::new_v4().to_string(),
                name: ngo.name.trim().to_string(),
                description: ngo.description.clone(),
                verified: false,
            };
            state
                .db
                .users()
                .create_with_ngo(
                    &uuid,
                    &registration.name,
                    &registration.email,
                    &password_hash,
                    &ngo,
                )
                .await
        }
        None => {
            state
                .db
                .users()
                .create(
                    &uuid,
                    &registration.name,
                    &registration.email,
                    &password_hash,
                    Role::Donor,
                )
                .await
        }
    };

    if let Err(e) = created {
        // Lost a race with a concurrent registration for the same email
        if matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation()) {
            return Err(ApiError::bad_request("User with this email already exists"));
        }
        return Err(ApiError::db_error("Failed to create user", e));
    }

    let user = state
        .db
        .users()
        .get_by_uuid(&uuid)
        .await
        .db_err("Failed to load new user")?
        .ok_or_else(|| ApiError::internal("Failed to load new user"))?;

    let tokens = state
        .jwt
        .issue_pair(&identity_for(&user))
        .internal_err("Failed to generate token")?;

    info!(user_id = %user.uuid, role = %user.role, "User registered");

    Ok((
        StatusCode::CREATED,
        set_auth_cookies(&tokens, state.secure_cookies),
        Json(AuthResponse {
            message: "User registered successfully",
            user: UserResponse::from(&user),
        }),
    ))
}

/// Clear both cookies. Works whether or not the caller was logged in.
async fn logout(State(state): State<AuthState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        clear_auth_cookies(state.secure_cookies),
        Json(MessageResponse {
            message: "Logout successful",
        }),
    )
}

/// Re-sign an access token from the refresh token's claims.
///
/// The credential store is not consulted and the refresh token is not
/// rotated: it stays usable until its original expiry.
async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> Result<Response, ApiError> {
    let refresh_token = get_refresh_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("No refresh token provided"))?;

    let Some(claims) = state.jwt.verify_refresh(refresh_token) else {
        // Stale cookies would only fail again; drop them.
        return Ok((
            clear_auth_cookies(state.secure_cookies),
            ApiError::unauthorized("Invalid refresh token"),
        )
            .into_response());
    };

    let access = state
        .jwt
        .issue_access_token(&claims.identity)
        .internal_err("Failed to generate token")?;

    debug!(user_id = %claims.identity.user_id, "Access token refreshed");

    Ok((
        StatusCode::OK,
        [(SET_COOKIE, access_cookie(&access, state.secure_cookies))],
        Json(MessageResponse {
            message: "Token refreshed successfully",
        }),
    )
        .into_response())
}

async fn me(auth: Auth<AnyRole>) -> impl IntoResponse {
    Json(MeResponse { user: auth.claims })
}
