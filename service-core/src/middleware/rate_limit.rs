//! Per-caller request throttling.
//!
//! Limiters are keyed by the caller's IP address and injected into the
//! middleware as a `SharedRateLimiter`, so the counter store can be swapped
//! without touching the routes that use it.

use crate::error::AppError;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use governor::{
    clock::{Clock, DefaultClock},
    state::keyed::DashMapStateStore,
    Quota,
};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    str::FromStr,
    sync::Arc,
    time::{Duration, Instant},
};

/// Stale windows are swept once the map grows past this many callers.
const PRUNE_THRESHOLD: usize = 10_000;

/// Outcome of a single limiter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

/// Counter store consulted once per request.
///
/// Implementations must make check-and-increment atomic per key so that
/// concurrent requests from one caller cannot overshoot the quota.
pub trait RateLimiter: Send + Sync + 'static {
    fn check_and_increment(&self, key: IpAddr) -> RateLimitDecision;
}

pub type SharedRateLimiter = Arc<dyn RateLimiter>;

/// Which limiter backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitStrategy {
    /// Counter reset at the end of each window, started by the key's first hit.
    #[default]
    FixedWindow,
    /// governor's GCRA with the same burst and average rate.
    Gcra,
}

impl FromStr for RateLimitStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixed_window" | "fixed-window" => Ok(RateLimitStrategy::FixedWindow),
            "gcra" => Ok(RateLimitStrategy::Gcra),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "unknown rate limit strategy '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window limiter backed by a `DashMap`.
pub struct FixedWindowRateLimiter {
    limit: u32,
    window: Duration,
    windows: DashMap<IpAddr, Window>,
}

/// A zero window or a zero quota is a configuration error.
fn check_quota(limit: u32, window: Duration) -> Result<NonZeroU32, AppError> {
    if window.is_zero() {
        return Err(AppError::ConfigError(anyhow::anyhow!(
            "rate limit window must be greater than zero"
        )));
    }
    NonZeroU32::new(limit).ok_or_else(|| {
        AppError::ConfigError(anyhow::anyhow!(
            "rate limit must allow at least one request per window"
        ))
    })
}

impl FixedWindowRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Result<Self, AppError> {
        let limit = check_quota(limit, window)?;

        Ok(Self {
            limit: limit.get(),
            window,
            windows: DashMap::new(),
        })
    }

    fn check_at(&self, key: IpAddr, now: Instant) -> RateLimitDecision {
        if self.windows.len() > PRUNE_THRESHOLD {
            self.prune_expired(now);
        }

        // The entry guard holds the shard lock until the end of this scope.
        let mut entry = self.windows.entry(key).or_insert(Window {
            started: now,
            count: 0,
        });

        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            entry.started = now;
            entry.count = 0;
        }

        if entry.count < self.limit {
            entry.count += 1;
            RateLimitDecision::Allowed
        } else {
            let elapsed = now.saturating_duration_since(entry.started);
            RateLimitDecision::Denied {
                retry_after: self.window.saturating_sub(elapsed),
            }
        }
    }

    /// Drop windows that have already ended.
    pub fn prune_expired(&self, now: Instant) {
        let window = self.window;
        self.windows
            .retain(|_, w| now.saturating_duration_since(w.started) < window);
    }

    pub fn tracked_keys(&self) -> usize {
        self.windows.len()
    }
}

impl RateLimiter for FixedWindowRateLimiter {
    fn check_and_increment(&self, key: IpAddr) -> RateLimitDecision {
        self.check_at(key, Instant::now())
    }
}

/// GCRA limiter keyed by IP.
pub struct GcraRateLimiter {
    inner: governor::RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock>,
}

impl GcraRateLimiter {
    pub fn new(limit: u32, window: Duration) -> Result<Self, AppError> {
        let burst = check_quota(limit, window)?;
        let period = window / burst.get();
        let quota = Quota::with_period(period)
            .ok_or_else(|| {
                AppError::ConfigError(anyhow::anyhow!(
                    "rate limit window {:?} is too short for {} requests",
                    window,
                    burst
                ))
            })?
            .allow_burst(burst);

        Ok(Self {
            inner: governor::RateLimiter::dashmap(quota),
        })
    }
}

impl RateLimiter for GcraRateLimiter {
    fn check_and_increment(&self, key: IpAddr) -> RateLimitDecision {
        match self.inner.check_key(&key) {
            Ok(_) => RateLimitDecision::Allowed,
            Err(negative) => RateLimitDecision::Denied {
                retry_after: negative.wait_time_from(DefaultClock::default().now()),
            },
        }
    }
}

/// Build the limiter for the configured strategy.
pub fn create_ip_rate_limiter(
    strategy: RateLimitStrategy,
    limit: u32,
    window: Duration,
) -> Result<SharedRateLimiter, AppError> {
    let limiter: SharedRateLimiter = match strategy {
        RateLimitStrategy::FixedWindow => Arc::new(FixedWindowRateLimiter::new(limit, window)?),
        RateLimitStrategy::Gcra => Arc::new(GcraRateLimiter::new(limit, window)?),
    };
    Ok(limiter)
}

/// Middleware state: the limiter plus how to resolve the caller address.
#[derive(Clone)]
pub struct IpRateLimit {
    pub limiter: SharedRateLimiter,
    /// Use the first `X-Forwarded-For` hop instead of the socket peer.
    pub trust_forwarded_for: bool,
}

impl IpRateLimit {
    pub fn new(limiter: SharedRateLimiter) -> Self {
        Self {
            limiter,
            trust_forwarded_for: false,
        }
    }

    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }

    fn caller_ip(&self, request: &Request) -> Option<IpAddr> {
        if self.trust_forwarded_for {
            let forwarded = request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.trim().parse::<IpAddr>().ok());
            if forwarded.is_some() {
                return forwarded;
            }
        }

        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip())
    }
}

/// Middleware for IP-based rate limiting
pub async fn ip_rate_limit_middleware(
    State(rate_limit): State<IpRateLimit>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    match rate_limit.caller_ip(&request) {
        Some(ip) => match rate_limit.limiter.check_and_increment(ip) {
            RateLimitDecision::Allowed => Ok(next.run(request).await),
            RateLimitDecision::Denied { retry_after } => {
                tracing::warn!(caller = %ip, "Rate limit exceeded");
                Err(AppError::TooManyRequests(
                    "Too many requests. Please try again later.".to_string(),
                    Some(retry_after.as_secs().max(1)),
                ))
            }
        },
        None => {
            tracing::warn!("Could not determine IP for rate limiting");
            Ok(next.run(request).await)
        }
    }
}
