/// Per-client rate limiting for the read and bind routes
use crate::{
    config::RateLimitConfig,
    context::AppContext,
    error::{ServiceError, ServiceResult},
};
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::{
    clock::{Clock, DefaultClock},
    DefaultKeyedRateLimiter, Quota, RateLimiter as GovernorLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use tracing::warn;

pub const READ_LIMIT_MESSAGE: &str = "Too many requests";
pub const WRITE_LIMIT_MESSAGE: &str = "Too many binding attempts";

/// Rate limiter manager, one bucket per client address
#[derive(Clone)]
pub struct RateLimiter {
    read: Arc<DefaultKeyedRateLimiter<IpAddr>>,
    write: Arc<DefaultKeyedRateLimiter<IpAddr>>,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            read: Arc::new(GovernorLimiter::keyed(per_minute(config.read_per_minute, 60))),
            write: Arc::new(GovernorLimiter::keyed(per_minute(config.write_per_minute, 10))),
        }
    }

    /// Check the quota shared by resolve and status lookups
    pub fn check_read(&self, client: IpAddr) -> ServiceResult<()> {
        check(&self.read, client, READ_LIMIT_MESSAGE)
    }

    /// Check the bind quota
    pub fn check_write(&self, client: IpAddr) -> ServiceResult<()> {
        check(&self.write, client, WRITE_LIMIT_MESSAGE)
    }

    /// Drop buckets that have fully refilled
    pub fn retain_recent(&self) {
        self.read.retain_recent();
        self.write.retain_recent();
    }
}

fn per_minute(requests: u32, fallback: u32) -> Quota {
    let requests = NonZeroU32::new(requests)
        .or(NonZeroU32::new(fallback))
        .unwrap_or(NonZeroU32::MIN);
    Quota::per_minute(requests)
}

fn check(limiter: &DefaultKeyedRateLimiter<IpAddr>, client: IpAddr, message: &'static str) -> ServiceResult<()> {
    limiter
        .check_key(&client)
        .map_err(|not_until| ServiceError::RateLimitExceeded {
            message,
            retry_after: not_until.wait_time_from(DefaultClock::default().now()),
        })
}

/// Peer address of the connection; requests without one share a bucket
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

/// Rate limiting middleware for read routes
pub async fn read_rate_limit(State(ctx): State<AppContext>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);
    match ctx.rate_limiter.check_read(client) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(%client, path = %request.uri().path(), "Read rate limit exceeded");
            e.into_response()
        }
    }
}

/// Rate limiting middleware for the bind route
pub async fn write_rate_limit(State(ctx): State<AppContext>, request: Request, next: Next) -> Response {
    let client = client_ip(&request);
    match ctx.rate_limiter.check_write(client) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            warn!(%client, path = %request.uri().path(), "Bind rate limit exceeded");
            e.into_response()
        }
    }
}
