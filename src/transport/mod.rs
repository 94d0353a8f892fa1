//! gRPC server wiring.
//!
//! Builds the RouteGuide router with the health service and the request
//! pipeline, and serves it on a bound TCP listener.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::pipeline::PipelineLayers;
use crate::proto::route_guide_server::RouteGuideServer;
use crate::repository::FeatureRepository;
use crate::services::RouteGuideService;

/// Boxed error returned by the serve functions.
pub type ServeError = Box<dyn std::error::Error + Send + Sync>;

/// Tower trace layer that extracts `x-correlation-id` from gRPC request headers.
///
/// Creates a tracing span per request with the correlation_id and path, so
/// all handler logging inherits them.
pub fn grpc_trace_layer() -> TraceLayer<
    tower_http::classify::SharedClassifier<tower_http::classify::GrpcErrorsAsFailures>,
    impl Fn(&http::Request<tonic::body::BoxBody>) -> tracing::Span + Clone,
> {
    TraceLayer::new_for_grpc().make_span_with(|request: &http::Request<tonic::body::BoxBody>| {
        let correlation_id = request
            .headers()
            .get("x-correlation-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        let path = request.uri().path();
        tracing::info_span!("grpc", %correlation_id, %path)
    })
}

/// Serve RouteGuide and health on `listener` until `signal` resolves.
///
/// After the signal, in-flight calls get `grace` to finish before the
/// server future is dropped.
pub async fn serve_with_shutdown<F>(
    listener: TcpListener,
    repo: Arc<FeatureRepository>,
    pipeline: PipelineLayers,
    grace: Duration,
    signal: F,
) -> Result<(), ServeError>
where
    F: Future<Output = ()> + Send,
{
    let (mut health_reporter, health_service) = tonic_health::server::health_reporter();
    health_reporter
        .set_service_status("", tonic_health::ServingStatus::Serving)
        .await;
    health_reporter
        .set_serving::<RouteGuideServer<RouteGuideService>>()
        .await;

    let address = listener.local_addr()?;
    info!(address = %address, "RouteGuide server listening");

    let notify = Arc::new(Notify::new());
    let signalled = notify.clone();
    let signal = async move {
        signal.await;
        info!("Draining in-flight calls");
        signalled.notify_one();
    };

    let server = Server::builder()
        .layer(grpc_trace_layer())
        .layer(pipeline)
        .add_service(health_service)
        .add_service(RouteGuideServer::new(RouteGuideService::new(repo)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), signal);
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => result?,
        _ = async {
            notify.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_secs = grace.as_secs(), "Shutdown grace period elapsed, dropping in-flight calls");
        }
    }

    info!("RouteGuide server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::storage::MemoryFeatureTable;

    #[tokio::test]
    async fn test_serve_stops_on_signal() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let repo = Arc::new(FeatureRepository::new(Arc::new(MemoryFeatureTable::new())));
        let pipeline = PipelineLayers::from_config(&PipelineConfig::default()).unwrap();

        let result = serve_with_shutdown(
            listener,
            repo,
            pipeline,
            Duration::from_secs(1),
            std::future::ready(()),
        )
        .await;
        assert!(result.is_ok());
    }
}
