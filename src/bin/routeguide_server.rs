//! routeguide-server: RouteGuide gRPC service
//!
//! Serves GetFeature, ListFeatures, RecordRoute and UpdateFeature over a
//! geohash-partitioned feature table, plus the standard gRPC health service.
//!
//! ## Architecture
//! ```text
//! [Client] -> [trace span] -> [response headers] -> [latency/fault injection]
//!                                                          |
//!                                                          v
//!                                               [RouteGuideService]
//!                                                          |
//!                                                          v
//!                                        [FeatureRepository] -> [Feature table]
//! ```
//!
//! ## Configuration
//! - `--config <path>` or ROUTEGUIDE_CONFIG: YAML configuration file
//! - ROUTEGUIDE__SECTION__KEY: per-key overrides (e.g. ROUTEGUIDE__SERVER__PORT)
//! - ROUTEGUIDE_LOG: tracing filter (default "info")

use std::sync::Arc;
use std::time::Duration;

use backon::Retryable;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use routeguide::config::Config;
use routeguide::loader::read_seed_file;
use routeguide::pipeline::PipelineLayers;
use routeguide::repository::FeatureRepository;
use routeguide::storage::{factory_for, StorageError};
use routeguide::transport::{serve_with_shutdown, ServeError};
use routeguide::utils::bootstrap::{init_tracing, parse_config_path, shutdown_signal};
use routeguide::utils::retry::{is_retryable_storage_error, startup_backoff};

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!("Starting routeguide-server");

    let factory = factory_for(&config.storage)?;
    let table = (|| factory.create())
        .retry(startup_backoff())
        .when(is_retryable_storage_error)
        .notify(|err: &StorageError, dur: Duration| {
            warn!(factory = factory.name(), error = %err, delay = ?dur, "Feature table unavailable, retrying");
        })
        .await?;
    let repo = Arc::new(FeatureRepository::with_config(table, &config.storage));

    let result = run(&config, repo.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "routeguide-server failed");
    }

    repo.close();
    info!("Feature table closed");
    result
}

async fn run(config: &Config, repo: Arc<FeatureRepository>) -> Result<(), ServeError> {
    if let Some(seed_path) = &config.storage.seed_path {
        let features = read_seed_file(seed_path)?;
        let summary = repo.load(features).await?;
        info!(
            path = %seed_path,
            written = summary.written,
            skipped = summary.skipped,
            "Seeded feature table"
        );
    }

    let pipeline = PipelineLayers::from_config(&config.pipeline)?;
    let listener = TcpListener::bind(config.server.addr()).await?;

    serve_with_shutdown(
        listener,
        repo,
        pipeline,
        Duration::from_secs(config.server.shutdown_grace_secs),
        shutdown_signal(),
    )
    .await
}
