//! Shared utilities for integration tests.
//!
//! Starts a real RouteGuide server on an ephemeral port and connects the
//! generated client to it.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

use routeguide::config::PipelineConfig;
use routeguide::pipeline::PipelineLayers;
use routeguide::repository::FeatureRepository;
use routeguide::storage::MemoryFeatureTable;
use routeguide::transport::{serve_with_shutdown, ServeError};

pub use routeguide::proto::{
    route_guide_client::RouteGuideClient, Feature, GetFeatureRequest, Point, Rectangle,
    UpdateFeatureRequest,
};

pub const BERKSHIRE: (i32, i32) = (409146138, -746188906);
pub const PATRIOTS_PATH: (i32, i32) = (407838351, -746143763);

pub fn point(latitude: i32, longitude: i32) -> Point {
    Point {
        latitude,
        longitude,
    }
}

pub fn feature(name: &str, latitude: i32, longitude: i32) -> Feature {
    Feature {
        name: name.to_string(),
        location: Some(point(latitude, longitude)),
    }
}

pub fn sample_features() -> Vec<Feature> {
    vec![
        feature(
            "Berkshire Valley Management Area Trail, Jefferson, NJ, USA",
            BERKSHIRE.0,
            BERKSHIRE.1,
        ),
        feature(
            "Patriots Path, Mendham, NJ 07945, USA",
            PATRIOTS_PATH.0,
            PATRIOTS_PATH.1,
        ),
        feature("", 416855156, -744420597),
    ]
}

/// A running server with a connected client.
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: RouteGuideClient<Channel>,
    pub repo: Arc<FeatureRepository>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<Result<(), ServeError>>>,
}

impl TestServer {
    /// Stop the server and wait for it to exit.
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.handle.take() {
            handle
                .await
                .expect("server task panicked")
                .expect("server failed");
        }
    }
}

/// Start a server seeded with `features` using the given pipeline.
pub async fn start_server(features: Vec<Feature>, pipeline: PipelineConfig) -> TestServer {
    let table = Arc::new(MemoryFeatureTable::new());
    let repo = Arc::new(FeatureRepository::new(table));
    repo.load(features).await.expect("seed load failed");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind ephemeral port");
    let addr = listener.local_addr().expect("No local address");

    let layers = PipelineLayers::from_config(&pipeline).expect("Invalid pipeline config");
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(serve_with_shutdown(
        listener,
        repo.clone(),
        layers,
        Duration::from_secs(1),
        async move {
            let _ = shutdown_rx.await;
        },
    ));

    let client = RouteGuideClient::connect(format!("http://{addr}"))
        .await
        .expect("Failed to connect to server");

    TestServer {
        addr,
        client,
        repo,
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    }
}
