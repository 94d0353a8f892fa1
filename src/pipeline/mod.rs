//! Request pipeline stages applied around the RouteGuide service.
//!
//! # Stage order (outermost first)
//!
//! 1. `grpc_trace_layer` (see `transport`): one `grpc` span per call
//! 2. [`ResponseHeaderLayer`]: logs request headers, adds the response header
//! 3. [`LatencyInjectionLayer`]: optional delay or `UNAVAILABLE` rejection
//!
//! Headers are attached even to injected faults because the header layer
//! wraps the latency layer.

pub mod headers;
pub mod latency;

pub use headers::{ResponseHeaderLayer, ResponseHeaderService};
pub use latency::{
    Decision, LatencyInjectionLayer, LatencyInjectionService, LatencyPolicy, LatencyStats,
};

use tower::Layer;
use tracing::info;

use crate::config::{ConfigError, PipelineConfig};

/// The configured header and latency stages as a single layer.
#[derive(Debug, Clone)]
pub struct PipelineLayers {
    headers: ResponseHeaderLayer,
    latency: LatencyInjectionLayer,
}

impl PipelineLayers {
    pub fn new(headers: ResponseHeaderLayer, latency: LatencyInjectionLayer) -> Self {
        Self { headers, latency }
    }

    pub fn from_config(config: &PipelineConfig) -> Result<Self, ConfigError> {
        let headers = ResponseHeaderLayer::from_config(&config.headers)?;
        let policy = LatencyPolicy::from_config(&config.latency);
        info!(
            headers = config.headers.enabled,
            latency = policy.is_enabled(),
            fault_percent = config.latency.fault_percent,
            "Request pipeline configured"
        );
        Ok(Self::new(headers, LatencyInjectionLayer::new(policy)))
    }

    pub fn latency_stats(&self) -> std::sync::Arc<LatencyStats> {
        self.latency.stats()
    }
}

impl<S> Layer<S> for PipelineLayers {
    type Service = ResponseHeaderService<LatencyInjectionService<S>>;

    fn layer(&self, inner: S) -> Self::Service {
        self.headers.layer(self.latency.layer(inner))
    }
}
