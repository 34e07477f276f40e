use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::State;
use axum::http::{header::RETRY_AFTER, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    refilled_at: Instant,
}

/// Token bucket shared by every request of a route group. Refills at `rps`
/// tokens per second and holds at most `rps`, so a burst of one second's
/// budget is admitted and then requests are spaced out evenly.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    name: &'static str,
    rps: u32,
    bucket: Arc<Mutex<Bucket>>,
}

impl RateLimiter {
    fn new(name: &'static str, rps: u32) -> Self {
        let rps = rps.max(1);
        Self {
            name,
            rps,
            bucket: Arc::new(Mutex::new(Bucket {
                tokens: f64::from(rps),
                refilled_at: Instant::now(),
            })),
        }
    }

    /// Takes a token, or returns how long until one is available.
    fn acquire(&self, now: Instant) -> Result<(), Duration> {
        let rate = f64::from(self.rps);
        let mut bucket = self.bucket.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(bucket.refilled_at).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * rate).min(rate);
        bucket.refilled_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            Ok(())
        } else {
            Err(Duration::from_secs_f64((1.0 - bucket.tokens) / rate))
        }
    }
}

pub async fn rps_middleware(
    State(state): State<RateLimiter>,
    req: Request<Body>,
    next: Next,
) -> Response {
    if let Err(wait) = state.acquire(Instant::now()) {
        // Retry-After is whole seconds; never advertise zero.
        let retry_after = wait.as_secs_f64().ceil().max(1.0) as u64;
        tracing::warn!(group = state.name, rps = state.rps, retry_after, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [(RETRY_AFTER, retry_after.to_string())],
            Json(json!({ "error": "Too many requests", "code": "rate_limited" })),
        )
            .into_response();
    }
    next.run(req).await
}

pub fn new_rps_state(name: &'static str, rps: u32) -> RateLimiter {
    RateLimiter::new(name, rps)
}
