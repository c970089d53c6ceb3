/// Rate Limiting System
use crate::{
    api::middleware::extract_access_token,
    config::RateLimitConfig,
    context::AppContext,
    error::{AppError, AppResult},
};
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovernorLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Duration};

const RETRY_AFTER: Duration = Duration::from_secs(1);

type DirectLimiter = GovernorLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Rate limiter manager
///
/// Requests carrying credentials draw from a larger bucket than anonymous ones.
#[derive(Clone)]
pub struct RateLimiter {
    authenticated: Arc<DirectLimiter>,
    unauthenticated: Arc<DirectLimiter>,
    limit: u32,
}

fn non_zero(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).unwrap_or(NonZeroU32::MIN)
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let auth_quota = Quota::per_second(non_zero(config.requests_per_second))
            .allow_burst(non_zero(config.burst_size));

        let unauth_quota = Quota::per_second(non_zero(config.requests_per_second / 10))
            .allow_burst(non_zero(config.burst_size / 5));

        Self {
            authenticated: Arc::new(GovernorLimiter::direct(auth_quota)),
            unauthenticated: Arc::new(GovernorLimiter::direct(unauth_quota)),
            limit: config.requests_per_second,
        }
    }

    fn check(limiter: &DirectLimiter) -> AppResult<()> {
        limiter.check().map_err(|_| AppError::RateLimitExceeded {
            retry_after: RETRY_AFTER,
        })
    }

    /// Check rate limit for a request with credentials
    pub fn check_authenticated(&self) -> AppResult<()> {
        Self::check(&self.authenticated)
    }

    /// Check rate limit for an anonymous request
    pub fn check_unauthenticated(&self) -> AppResult<()> {
        Self::check(&self.unauthenticated)
    }
}

/// Rate limiting middleware
pub async fn rate_limit_middleware(
    State(ctx): State<AppContext>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Presence of credentials is enough to pick the bucket; validation happens later
    let has_credentials = extract_access_token(request.headers()).is_some();

    if has_credentials {
        ctx.rate_limiter.check_authenticated()?;
    } else {
        ctx.rate_limiter.check_unauthenticated()?;
    }

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("X-RateLimit-Limit", HeaderValue::from(ctx.rate_limiter.limit));

    Ok(response)
}
