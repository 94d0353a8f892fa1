//! Retry utilities: backoff builders and retryable error classification.
//!
//! Uses `backon` for exponential backoff with jitter.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::storage::StorageError;

/// Backoff for re-submitting unprocessed items of a batch write.
///
/// - Min delay: 50ms
/// - Max delay: 2s
/// - Max attempts: 8
/// - Jitter enabled
pub fn batch_write_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(50))
        .with_max_delay(Duration::from_secs(2))
        .with_max_times(8)
        .with_jitter()
}

/// Backoff for reaching the backing store at startup.
///
/// - Min delay: 100ms
/// - Max delay: 5s
/// - Max attempts: 30
/// - Jitter enabled
pub fn startup_backoff() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_millis(100))
        .with_max_delay(Duration::from_secs(5))
        .with_max_times(30)
        .with_jitter()
}

/// Determines if a storage error is worth retrying.
///
/// Only `Unavailable` is transient. A closed client stays closed, and
/// malformed data or bad coordinates fail the same way every time.
pub fn is_retryable_storage_error(error: &StorageError) -> bool {
    matches!(error, StorageError::Unavailable(_))
}
