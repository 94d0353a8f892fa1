//! Request pipeline configuration types.

use serde::Deserialize;

/// Request pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Response header injection.
    pub headers: HeaderConfig,
    /// Latency and fault injection.
    pub latency: LatencyConfig,
}

/// Response header injection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Log request headers and attach the response header.
    pub enabled: bool,
    /// Response header name.
    pub response_key: String,
    /// Response header value.
    pub response_value: String,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            response_key: "custom_server_header_key".to_string(),
            response_value: "customRespondValue".to_string(),
        }
    }
}

/// One probability band of injected latency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LatencyTier {
    /// Share of calls (out of 100) that fall in this band.
    pub percent: u32,
    /// Delay applied to those calls.
    pub delay_ms: u64,
}

/// Latency and fault injection configuration.
///
/// Tiers are evaluated in order against a roll in `0..100`; a call that
/// falls in no tier gets `baseline_delay_ms`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Disabled by default.
    pub enabled: bool,
    /// Probability bands.
    pub tiers: Vec<LatencyTier>,
    /// Delay for calls outside every tier.
    pub baseline_delay_ms: u64,
    /// Share of calls (out of 100) rejected with `Unavailable`.
    pub fault_percent: u32,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tiers: vec![
                LatencyTier {
                    percent: 1,
                    delay_ms: 10_000,
                },
                LatencyTier {
                    percent: 4,
                    delay_ms: 5_000,
                },
                LatencyTier {
                    percent: 5,
                    delay_ms: 2_000,
                },
            ],
            baseline_delay_ms: 0,
            fault_percent: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert!(config.headers.enabled);
        assert_eq!(config.headers.response_key, "custom_server_header_key");
        assert!(!config.latency.enabled);
        assert_eq!(
            config.latency.tiers.iter().map(|t| t.percent).sum::<u32>(),
            10
        );
        assert_eq!(config.latency.fault_percent, 0);
    }
}
