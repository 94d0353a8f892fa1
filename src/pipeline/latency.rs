//! Latency and fault injection for exercising client timeouts and retries.
//!
//! Every call rolls against the configured tiers and is either passed
//! straight through, delayed, or rejected with `UNAVAILABLE` before it
//! reaches the service.
//!
//! # Example
//!
//! ```ignore
//! use routeguide::pipeline::{LatencyInjectionLayer, LatencyPolicy};
//!
//! // 5% of calls wait two seconds, 1% are rejected
//! let policy = LatencyPolicy::from_config(&LatencyConfig {
//!     enabled: true,
//!     tiers: vec![LatencyTier { percent: 5, delay_ms: 2000 }],
//!     baseline_delay_ms: 0,
//!     fault_percent: 1,
//! });
//! let layer = LatencyInjectionLayer::new(policy);
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use rand::Rng;
use tower::{Layer, Service};
use tracing::{debug, warn};

use crate::config::{LatencyConfig, LatencyTier};

/// What to do with a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Delay(Duration),
    Reject,
}

/// Tiered delay and fault policy.
#[derive(Debug, Clone, Default)]
pub struct LatencyPolicy {
    enabled: bool,
    tiers: Vec<LatencyTier>,
    baseline: Duration,
    fault_percent: u32,
}

impl LatencyPolicy {
    /// A policy that never delays or rejects.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_config(config: &LatencyConfig) -> Self {
        Self {
            enabled: config.enabled,
            tiers: config.tiers.clone(),
            baseline: Duration::from_millis(config.baseline_delay_ms),
            fault_percent: config.fault_percent.min(100),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Decide for a pair of rolls in `0..100`.
    ///
    /// `fault_roll` is checked first; `delay_roll` then walks the tiers
    /// cumulatively in order.
    pub fn decide(&self, delay_roll: u32, fault_roll: u32) -> Decision {
        if !self.enabled {
            return Decision::Pass;
        }
        if fault_roll < self.fault_percent {
            return Decision::Reject;
        }

        let mut threshold = 0u32;
        for tier in &self.tiers {
            threshold = threshold.saturating_add(tier.percent);
            if delay_roll < threshold {
                return Decision::Delay(Duration::from_millis(tier.delay_ms));
            }
        }

        if self.baseline.is_zero() {
            Decision::Pass
        } else {
            Decision::Delay(self.baseline)
        }
    }

    /// Roll and decide.
    pub fn sample(&self) -> Decision {
        if !self.enabled {
            return Decision::Pass;
        }
        let mut rng = rand::rng();
        let delay_roll = rng.random_range(0..100);
        let fault_roll = rng.random_range(0..100);
        self.decide(delay_roll, fault_roll)
    }
}

/// Counters for injected behavior.
#[derive(Debug, Default)]
pub struct LatencyStats {
    /// Calls seen.
    pub total: AtomicU64,
    /// Calls delayed before dispatch.
    pub delayed: AtomicU64,
    /// Calls rejected without dispatch.
    pub rejected: AtomicU64,
}

impl LatencyStats {
    /// Snapshot of `(total, delayed, rejected)`.
    pub fn snapshot(&self) -> (u64, u64, u64) {
        (
            self.total.load(Ordering::Relaxed),
            self.delayed.load(Ordering::Relaxed),
            self.rejected.load(Ordering::Relaxed),
        )
    }
}

/// Layer applying a [`LatencyPolicy`] to every call.
#[derive(Debug, Clone)]
pub struct LatencyInjectionLayer {
    policy: Arc<LatencyPolicy>,
    stats: Arc<LatencyStats>,
}

impl LatencyInjectionLayer {
    pub fn new(policy: LatencyPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            stats: Arc::new(LatencyStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<LatencyStats> {
        self.stats.clone()
    }
}

impl<S> Layer<S> for LatencyInjectionLayer {
    type Service = LatencyInjectionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LatencyInjectionService {
            inner,
            policy: self.policy.clone(),
            stats: self.stats.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencyInjectionService<S> {
    inner: S,
    policy: Arc<LatencyPolicy>,
    stats: Arc<LatencyStats>,
}

impl<S, ReqBody, ResBody> Service<http::Request<ReqBody>> for LatencyInjectionService<S>
where
    S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    ReqBody: Send + 'static,
    ResBody: Default + Send + 'static,
{
    type Response = http::Response<ResBody>;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<ReqBody>) -> Self::Future {
        // The service that was polled ready moves into the future.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        self.stats.total.fetch_add(1, Ordering::Relaxed);
        let decision = self.policy.sample();
        let stats = self.stats.clone();
        let path = request.uri().path().to_string();

        Box::pin(async move {
            match decision {
                Decision::Pass => {}
                Decision::Delay(delay) => {
                    stats.delayed.fetch_add(1, Ordering::Relaxed);
                    debug!(path = %path, delay_ms = delay.as_millis() as u64, "Injecting latency");
                    tokio::time::sleep(delay).await;
                }
                Decision::Reject => {
                    stats.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(path = %path, "Injecting fault, rejecting call");
                    return Ok(unavailable_response());
                }
            }
            inner.call(request).await
        })
    }
}

/// Trailers-only gRPC response carrying `UNAVAILABLE`.
fn unavailable_response<B: Default>() -> http::Response<B> {
    let mut response = http::Response::new(B::default());
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/grpc"),
    );
    if let Err(e) = tonic::Status::unavailable("Injected fault").add_header(headers) {
        warn!(error = %e, "Failed to encode injected fault status");
    }
    response
}
