pub mod api;
pub mod auth;
pub mod cli;
pub mod db;
pub mod gate;
pub mod jwt;
pub mod rate_limit;

use api::auth::AuthState;
use api::sections::SectionsState;
use axum::{Router, middleware};
use db::Database;
use gate::protected_route_gate;
use jwt::JwtConfig;
use rate_limit::{RateLimitConfig, spawn_limiter_cleanup};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

pub struct ServerConfig {
    /// Database connection (cloneable, uses connection pool internally)
    pub db: Database,
    /// JWT secret for signing tokens
    pub jwt_secret: Vec<u8>,
    /// Whether to set Secure flag on cookies (true in production)
    pub secure_cookies: bool,
    /// Per-IP limits for login and registration
    pub rate_limits: RateLimitConfig,
}

/// Create the application router with the given configuration.
pub fn create_app(config: &ServerConfig) -> Router {
    let jwt = Arc::new(JwtConfig::new(&config.jwt_secret));

    let auth_state = AuthState {
        db: config.db.clone(),
        jwt: jwt.clone(),
        secure_cookies: config.secure_cookies,
        rate_limits: Arc::new(config.rate_limits.clone()),
    };

    let sections_state = SectionsState { jwt: jwt.clone() };

    Router::new()
        .nest("/auth", api::auth::router(auth_state))
        .merge(api::sections::router(sections_state))
        .layer(middleware::from_fn_with_state(jwt, protected_route_gate))
}

/// Run the server on the given listener. This function blocks until the server exits.
pub async fn run_server(config: ServerConfig, listener: TcpListener) -> Result<(), std::io::Error> {
    let app = create_app(&config);
    let cleanup = spawn_limiter_cleanup(config.rate_limits.clone());
    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let result = axum::serve(listener, make_service).await;
    cleanup.abort();
    result
}

/// Start the server on the given port in a background task. Use port 0 to let the OS choose a random port.
/// Returns the actual address the server is listening on.
/// Note: For production use, prefer `run_server` directly in main.
pub async fn start_server(
    config: ServerConfig,
    port: u16,
) -> Result<(tokio::task::JoinHandle<()>, SocketAddr), std::io::Error> {
    let addr = format!("127.0.0.1:{}", port);
    let listener = TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = run_server(config, listener).await {
            tracing::error!(error = %e, "Server error");
        }
    });

    Ok((handle, local_addr))
}
