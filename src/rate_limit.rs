//! Rate limiting for the credential endpoints.
//!
//! Uses a token bucket algorithm with per-IP tracking to slow down password
//! guessing and signup spam.

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{Quota, RateLimiter, clock::DefaultClock, state::keyed::DefaultKeyedStateStore};
use std::{net::SocketAddr, num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

use crate::api::ApiError;

/// Per-IP rate limiter.
pub type IpLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

const LOGIN_PER_MINUTE: NonZeroU32 = NonZeroU32::new(30).unwrap();
const LOGIN_BURST: NonZeroU32 = NonZeroU32::new(5).unwrap();
const REGISTER_PER_MINUTE: NonZeroU32 = NonZeroU32::new(3).unwrap();
const PERMISSIVE_PER_SECOND: NonZeroU32 = NonZeroU32::new(1000).unwrap();

/// Interval between sweeps of idle per-IP limiter state.
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Rate limiting configuration for the login and register endpoints.
#[derive(Clone)]
pub struct RateLimitConfig {
    /// Login: bursts of 5, refilling one attempt every 2 seconds
    pub login: Arc<IpLimiter>,
    /// Registration: 3 per minute
    pub register: Arc<IpLimiter>,
    /// Take the client IP from the first `X-Forwarded-For` entry
    pub trust_proxy: bool,
}

impl RateLimitConfig {
    /// Production limits.
    pub fn new(trust_proxy: bool) -> Self {
        Self::with_quotas(
            Quota::per_minute(LOGIN_PER_MINUTE).allow_burst(LOGIN_BURST),
            Quota::per_minute(REGISTER_PER_MINUTE),
            trust_proxy,
        )
    }

    pub fn with_quotas(login: Quota, register: Quota, trust_proxy: bool) -> Self {
        Self {
            login: Arc::new(RateLimiter::keyed(login)),
            register: Arc::new(RateLimiter::keyed(register)),
            trust_proxy,
        }
    }

    /// Limits high enough to never trigger, for tests and local scripting.
    pub fn permissive() -> Self {
        let quota = Quota::per_second(PERMISSIVE_PER_SECOND);
        Self::with_quotas(quota, quota, false)
    }

    /// Forget clients whose bucket has refilled completely. They would start
    /// from a full bucket anyway, so nothing observable changes.
    pub fn retain_recent(&self) {
        for limiter in [&self.login, &self.register] {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of per-IP entries currently held across both limiters.
    pub fn tracked_clients(&self) -> usize {
        self.login.len() + self.register.len()
    }
}

/// Spawn a background task that sweeps idle limiter state periodically.
/// Returns a handle that can be used to abort the task.
pub fn spawn_limiter_cleanup(config: RateLimitConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);

        loop {
            interval.tick().await;
            config.retain_recent();
            debug!(
                tracked = config.tracked_clients(),
                "Swept idle rate limit entries"
            );
        }
    })
}

/// Client IP used as the rate limit key.
fn client_key(request: &Request, trust_proxy: bool) -> String {
    if trust_proxy {
        let forwarded = request
            .headers()
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Middleware for rate limiting login attempts.
pub async fn rate_limit_login(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_key(&request, config.trust_proxy);

    match config.login.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => {
            tracing::warn!(ip = %ip, "Login rate limit exceeded");
            ApiError::too_many_requests(
                "Too many login attempts. Please wait before trying again.",
            )
            .into_response()
        }
    }
}

/// Middleware for rate limiting registration.
pub async fn rate_limit_register(
    State(config): State<Arc<RateLimitConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_key(&request, config.trust_proxy);

    match config.register.check_key(&ip) {
        Ok(_) => next.run(request).await,
        Err(_) => ApiError::too_many_requests(
            "Too many signup attempts. Please wait before trying again.",
        )
        .into_response(),
    }
}
