//! Landing endpoints for the protected sections.
//!
//! The routing gate redirects visitors before they get here. Each handler
//! also extracts `Auth<C>` for its section, so a landing answers 401/403 on
//! its own when served without the gate.

use axum::{
    Json, Router,
    extract::OriginalUri,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;

use crate::auth::{AdminOnly, AnyRole, Auth, DonorOnly, NgoOnly, RoleConstraint};
use crate::impl_has_auth_backend;
use crate::jwt::{Identity, JwtConfig};

#[derive(Clone)]
pub struct SectionsState {
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(SectionsState);

pub fn router(state: SectionsState) -> Router {
    Router::new()
        .route("/dashboard", get(landing::<AnyRole>))
        .route("/dashboard/{*rest}", get(landing::<AnyRole>))
        .route("/donor", get(landing::<DonorOnly>))
        .route("/donor/{*rest}", get(landing::<DonorOnly>))
        .route("/ngo", get(landing::<NgoOnly>))
        .route("/ngo/{*rest}", get(landing::<NgoOnly>))
        .route("/admin", get(landing::<AdminOnly>))
        .route("/admin/{*rest}", get(landing::<AdminOnly>))
        .with_state(state)
}

#[derive(Serialize)]
struct SectionResponse {
    path: String,
    user: Identity,
}

async fn landing<C: RoleConstraint + 'static>(
    OriginalUri(uri): OriginalUri,
    auth: Auth<C>,
) -> impl IntoResponse {
    Json(SectionResponse {
        path: uri.path().to_string(),
        user: auth.claims.identity,
    })
}
