//! Request pipeline behavior over the wire.

use tonic::Code;

use routeguide::config::{LatencyConfig, PipelineConfig};

use crate::common::{point, sample_features, start_server, GetFeatureRequest, BERKSHIRE};

fn request() -> GetFeatureRequest {
    GetFeatureRequest {
        point: Some(point(BERKSHIRE.0, BERKSHIRE.1)),
        field_mask: None,
    }
}

#[tokio::test]
async fn test_response_carries_custom_header() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let response = server.client.get_feature(request()).await.unwrap();
    assert_eq!(
        response
            .metadata()
            .get("custom_server_header_key")
            .unwrap()
            .to_str()
            .unwrap(),
        "customRespondValue"
    );

    server.stop().await;
}

#[tokio::test]
async fn test_full_fault_rate_rejects_calls() {
    let pipeline = PipelineConfig {
        latency: LatencyConfig {
            enabled: true,
            tiers: vec![],
            baseline_delay_ms: 0,
            fault_percent: 100,
        },
        ..PipelineConfig::default()
    };
    let mut server = start_server(sample_features(), pipeline).await;

    let status = server.client.get_feature(request()).await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    server.stop().await;
}

#[tokio::test]
async fn test_baseline_delay_is_observed() {
    let pipeline = PipelineConfig {
        latency: LatencyConfig {
            enabled: true,
            tiers: vec![],
            baseline_delay_ms: 200,
            fault_percent: 0,
        },
        ..PipelineConfig::default()
    };
    let mut server = start_server(sample_features(), pipeline).await;

    let start = std::time::Instant::now();
    let found = server
        .client
        .get_feature(request())
        .await
        .unwrap()
        .into_inner();
    assert!(start.elapsed() >= std::time::Duration::from_millis(200));
    assert!(!found.name.is_empty());

    server.stop().await;
}
