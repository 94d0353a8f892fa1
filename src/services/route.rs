//! Route recording for the client-streaming RecordRoute call.

use tokio_stream::{Stream, StreamExt};
use tonic::Status;
use tracing::{debug, info, warn};

use super::map_storage_error;
use crate::proto::{Point, RouteSummary};
use crate::repository::FeatureRepository;

/// Lifecycle of a single RecordRoute call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteState {
    /// No points received yet.
    Open,
    /// At least one point received.
    Receiving,
    /// Stream ended normally; the summary has been produced.
    Completed,
    /// Stream failed or was cancelled; no summary.
    Cancelled,
}

impl RouteState {
    pub fn is_terminal(self) -> bool {
        matches!(self, RouteState::Completed | RouteState::Cancelled)
    }
}

/// Per-call route accumulator.
#[derive(Debug)]
pub struct RouteRecorder {
    state: RouteState,
    point_count: i32,
    feature_count: i32,
}

impl Default for RouteRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteRecorder {
    pub fn new() -> Self {
        Self {
            state: RouteState::Open,
            point_count: 0,
            feature_count: 0,
        }
    }

    pub fn state(&self) -> RouteState {
        self.state
    }

    pub fn point_count(&self) -> i32 {
        self.point_count
    }

    pub fn feature_count(&self) -> i32 {
        self.feature_count
    }

    /// Count a received point. Ignored once the route is terminal.
    pub fn record(&mut self, has_feature: bool) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = RouteState::Receiving;
        self.point_count = self.point_count.saturating_add(1);
        if has_feature {
            self.feature_count = self.feature_count.saturating_add(1);
        }
        true
    }

    /// Finish the route. Yields the summary exactly once.
    pub fn complete(&mut self) -> Option<RouteSummary> {
        if self.state.is_terminal() {
            return None;
        }
        self.state = RouteState::Completed;
        Some(RouteSummary {
            point_count: self.point_count,
            feature_count: self.feature_count,
        })
    }

    /// Abandon the route. Returns `false` if it had already finished.
    pub fn cancel(&mut self) -> bool {
        if self.state.is_terminal() {
            return false;
        }
        self.state = RouteState::Cancelled;
        true
    }
}

/// Drive a recorder over a stream of points.
///
/// An upstream error ends the call with that status and no summary.
pub async fn record_route_stream<S>(
    repo: &FeatureRepository,
    mut points: S,
) -> Result<RouteSummary, Status>
where
    S: Stream<Item = Result<Point, Status>> + Unpin,
{
    let mut recorder = RouteRecorder::new();

    while let Some(item) = points.next().await {
        let point = match item {
            Ok(point) => point,
            Err(status) => {
                recorder.cancel();
                warn!(
                    points = recorder.point_count(),
                    code = ?status.code(),
                    "RecordRoute stream ended with error, no summary"
                );
                return Err(status);
            }
        };

        let has_feature = match repo.has_feature(&point).await {
            Ok(has_feature) => has_feature,
            Err(e) => {
                recorder.cancel();
                return Err(map_storage_error(e));
            }
        };
        recorder.record(has_feature);
        debug!(
            latitude = point.latitude,
            longitude = point.longitude,
            has_feature,
            "Recorded route point"
        );
    }

    let summary = recorder
        .complete()
        .ok_or_else(|| Status::internal("route already finished"))?;
    info!(
        point_count = summary.point_count,
        feature_count = summary.feature_count,
        "RecordRoute completed"
    );
    Ok(summary)
}
