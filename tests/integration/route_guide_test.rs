//! RouteGuide RPCs over the wire.

use prost_types::FieldMask;
use tonic::Code;

use routeguide::config::PipelineConfig;

use crate::common::{
    feature, point, sample_features, start_server, GetFeatureRequest, Rectangle,
    UpdateFeatureRequest, BERKSHIRE, PATRIOTS_PATH,
};

fn mask(paths: &[&str]) -> Option<FieldMask> {
    Some(FieldMask {
        paths: paths.iter().map(|p| p.to_string()).collect(),
    })
}

#[tokio::test]
async fn test_get_feature_round_trip() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let found = server
        .client
        .get_feature(GetFeatureRequest {
            point: Some(point(BERKSHIRE.0, BERKSHIRE.1)),
            field_mask: None,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        found.name,
        "Berkshire Valley Management Area Trail, Jefferson, NJ, USA"
    );

    let missing = server
        .client
        .get_feature(GetFeatureRequest {
            point: Some(point(1, 1)),
            field_mask: None,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(missing, feature("", 1, 1));

    server.stop().await;
}

#[tokio::test]
async fn test_get_feature_with_name_mask() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let projected = server
        .client
        .get_feature(GetFeatureRequest {
            point: Some(point(PATRIOTS_PATH.0, PATRIOTS_PATH.1)),
            field_mask: mask(&["name"]),
        })
        .await
        .unwrap()
        .into_inner();

    assert_eq!(projected.name, "Patriots Path, Mendham, NJ 07945, USA");
    assert_eq!(projected.location, None);

    server.stop().await;
}

#[tokio::test]
async fn test_list_features_streams_rectangle() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let mut stream = server
        .client
        .list_features(Rectangle {
            lo: Some(point(410000000, -740000000)),
            hi: Some(point(400000000, -750000000)),
        })
        .await
        .unwrap()
        .into_inner();

    let mut names = Vec::new();
    while let Some(feature) = stream.message().await.unwrap() {
        names.push(feature.name);
    }
    assert_eq!(
        names,
        vec![
            "Berkshire Valley Management Area Trail, Jefferson, NJ, USA".to_string(),
            "Patriots Path, Mendham, NJ 07945, USA".to_string(),
        ]
    );

    server.stop().await;
}

#[tokio::test]
async fn test_record_route_summary() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let points = vec![
        point(BERKSHIRE.0, BERKSHIRE.1),
        point(1, 1),
        point(PATRIOTS_PATH.0, PATRIOTS_PATH.1),
    ];
    let summary = server
        .client
        .record_route(tokio_stream::iter(points))
        .await
        .unwrap()
        .into_inner();

    assert_eq!(summary.point_count, 3);
    assert_eq!(summary.feature_count, 2);

    server.stop().await;
}

#[tokio::test]
async fn test_update_feature_then_get() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let response = server
        .client
        .update_feature(UpdateFeatureRequest {
            feature: Some(feature("Renamed trail", BERKSHIRE.0, BERKSHIRE.1)),
            update_mask: mask(&["name"]),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(
        response.feature,
        Some(feature("Renamed trail", BERKSHIRE.0, BERKSHIRE.1))
    );

    let fetched = server
        .client
        .get_feature(GetFeatureRequest {
            point: Some(point(BERKSHIRE.0, BERKSHIRE.1)),
            field_mask: None,
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(fetched.name, "Renamed trail");

    server.stop().await;
}

#[tokio::test]
async fn test_update_feature_rejections() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;

    let empty_mask = server
        .client
        .update_feature(UpdateFeatureRequest {
            feature: Some(feature("X", BERKSHIRE.0, BERKSHIRE.1)),
            update_mask: None,
        })
        .await
        .unwrap_err();
    assert_eq!(empty_mask.code(), Code::InvalidArgument);

    let not_found = server
        .client
        .update_feature(UpdateFeatureRequest {
            feature: Some(feature("X", 1, 1)),
            update_mask: mask(&["name"]),
        })
        .await
        .unwrap_err();
    assert_eq!(not_found.code(), Code::InvalidArgument);

    server.stop().await;
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let mut server = start_server(sample_features(), PipelineConfig::default()).await;
    server.repo.close();

    let status = server
        .client
        .get_feature(GetFeatureRequest {
            point: Some(point(BERKSHIRE.0, BERKSHIRE.1)),
            field_mask: None,
        })
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);

    server.stop().await;
}

#[tokio::test]
async fn test_health_service_reports_serving() {
    use tonic_health::pb::health_check_response::ServingStatus;
    use tonic_health::pb::health_client::HealthClient;
    use tonic_health::pb::HealthCheckRequest;

    let server = start_server(vec![], PipelineConfig::default()).await;
    let channel = tonic::transport::Channel::from_shared(format!("http://{}", server.addr))
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut health = HealthClient::new(channel);

    let response = health
        .check(HealthCheckRequest {
            service: "routeguide.RouteGuide".to_string(),
        })
        .await
        .unwrap()
        .into_inner();
    assert_eq!(response.status, ServingStatus::Serving as i32);

    server.stop().await;
}
