//! Sliding-window rate limiter guarding the AI routes.
//!
//! Requests beyond the configured per-second budget get 429 with a JSON
//! `{error}` body.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};

use super::ErrorResponse;

const WINDOW: Duration = Duration::from_secs(1);

/// Shared state for one rate-limit bucket.
#[derive(Clone)]
pub struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_per_window: usize,
}

impl RateLimiter {
    /// Allow `max_per_second` requests per second. Zero is treated as one.
    pub fn new(max_per_second: usize) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_per_window: max_per_second.max(1),
        }
    }

    /// Records the request and returns true when under the limit.
    fn check(&self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&self, now: Instant) -> bool {
        let mut timestamps = self.timestamps.lock().unwrap_or_else(|e| e.into_inner());
        while timestamps
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= WINDOW)
        {
            timestamps.pop_front();
        }
        if timestamps.len() < self.max_per_window {
            timestamps.push_back(now);
            true
        } else {
            false
        }
    }
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    req: Request,
    next: Next,
) -> Response {
    if limiter.check() {
        next.run(req).await
    } else {
        log::warn!(
            target: "flowboard.api.rate_limit",
            "Rate limit exceeded (max {}/s)",
            limiter.max_per_window
        );
        (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", "1")],
            Json(ErrorResponse {
                error: "Too many AI requests, try again shortly".to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_budget_refills_after_window() {
        let limiter = RateLimiter::new(2);
        let start = Instant::now();
        assert!(limiter.check_at(start));
        assert!(limiter.check_at(start + Duration::from_millis(100)));
        assert!(!limiter.check_at(start + Duration::from_millis(200)));
        assert!(limiter.check_at(start + Duration::from_millis(1000)));
    }

    #[test]
    fn test_zero_budget_still_allows_one() {
        let limiter = RateLimiter::new(0);
        let now = Instant::now();
        assert!(limiter.check_at(now));
        assert!(!limiter.check_at(now));
    }
}
