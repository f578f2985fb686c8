use std::collections::VecDeque;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use dashmap::DashMap;

use crate::models::ApiResponse;

/// Request class, each with its own per-IP sliding window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    /// Read-only catalog and availability endpoints.
    Public,
    /// Booking creation; strictest, it writes and can be spammed.
    Booking,
    /// Admin endpoints (already cookie-gated).
    Admin,
}

impl Tier {
    fn limit(self) -> (u32, Duration) {
        match self {
            Tier::Public => (60, Duration::from_secs(60)),
            Tier::Booking => (5, Duration::from_secs(300)),
            Tier::Admin => (120, Duration::from_secs(60)),
        }
    }
}

/// In-memory per-IP sliding-window rate limiter.
#[derive(Debug, Clone, Default)]
pub struct RateLimiter {
    buckets: Arc<DashMap<(Tier, IpAddr), VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Ok(())` when the request is allowed, `Err(retry_after_secs)` when
    /// the window is full.
    pub fn check(&self, tier: Tier, ip: IpAddr) -> Result<(), u64> {
        let (max_requests, window) = tier.limit();
        let now = Instant::now();

        let mut hits = self.buckets.entry((tier, ip)).or_default();
        while hits.front().is_some_and(|t| now.duration_since(*t) >= window) {
            hits.pop_front();
        }

        if hits.len() >= max_requests as usize {
            let oldest = hits[0];
            let retry_after = (oldest + window)
                .saturating_duration_since(now)
                .as_secs()
                .max(1);
            return Err(retry_after);
        }

        hits.push_back(now);
        Ok(())
    }

    /// Drop buckets whose newest hit is older than twice the tier window.
    /// Called from a periodic background task.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.buckets.retain(|(tier, _), hits| {
            let (_, window) = tier.limit();
            hits.back()
                .is_some_and(|t| now.duration_since(*t) < window * 2)
        });
    }
}

/// Client IP: first X-Forwarded-For entry (reverse proxy) or the socket peer.
fn client_ip(req: &Request) -> IpAddr {
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .and_then(|v| v.trim().parse().ok())
        .or_else(|| {
            req.extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ci| ci.0.ip())
        })
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

/// Middleware shared by all tiers; attach with
/// `from_fn_with_state((limiter, Tier::...), throttle)`.
pub async fn throttle(
    State((limiter, tier)): State<(RateLimiter, Tier)>,
    req: Request,
    next: Next,
) -> Result<Response, Response> {
    let ip = client_ip(&req);
    limiter.check(tier, ip).map_err(|retry_after| {
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("Retry-After", retry_after.to_string())],
            Json(ApiResponse::<()>::error(format!(
                "Too many requests. Try again in {} seconds",
                retry_after
            ))),
        )
            .into_response()
    })?;
    Ok(next.run(req).await)
}
