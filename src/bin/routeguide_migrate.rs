//! routeguide-migrate: bulk-load a feature database into the feature table
//!
//! Usage: `routeguide-migrate [--config <path>] [seed.json]`
//!
//! The seed path falls back to `storage.seed_path`. Unnamed features are
//! skipped. Each run assigns fresh feature ids, so loading the same file
//! twice stores every feature twice.

use tracing::{error, info, warn};

use routeguide::config::{Config, StorageBackend};
use routeguide::loader::read_seed_file;
use routeguide::repository::FeatureRepository;
use routeguide::transport::ServeError;
use routeguide::utils::bootstrap::{init_tracing, parse_config_path, positional_arg};

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    init_tracing();

    let config_path = parse_config_path();
    let config = Config::load(config_path.as_deref()).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let seed_path = positional_arg()
        .or_else(|| config.storage.seed_path.clone())
        .ok_or("usage: routeguide-migrate [--config <path>] <seed.json>")?;

    if config.storage.backend == StorageBackend::Memory {
        warn!("Memory backend selected; loaded features are discarded on exit");
    }

    info!(path = %seed_path, table = %config.storage.table_name, "Starting migration");
    let features = read_seed_file(&seed_path)?;

    let factory = routeguide::storage::factory_for(&config.storage)?;
    let table = factory.create().await?;
    let repo = FeatureRepository::with_config(table, &config.storage);

    let result = repo.load(features).await;
    repo.close();

    let summary = result.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;
    info!(
        written = summary.written,
        skipped = summary.skipped,
        batches = summary.batches,
        "Migration completed"
    );
    Ok(())
}
