//! RouteGuide gRPC service.

use std::sync::Arc;

use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status, Streaming};
use tracing::{info, warn};

use super::map_storage_error;
use super::route::record_route_stream;
use crate::field_mask;
use crate::proto::{
    route_guide_server::RouteGuide, Feature, GetFeatureRequest, Point, Rectangle, RouteSummary,
    UpdateFeatureRequest, UpdateFeatureResponse,
};
use crate::repository::FeatureRepository;

/// Buffered features between the listing task and the response stream.
const LIST_CHANNEL_CAPACITY: usize = 32;

/// Normalized rectangle bounds; corners may arrive in any order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub min_latitude: i32,
    pub max_latitude: i32,
    pub min_longitude: i32,
    pub max_longitude: i32,
}

impl Bounds {
    /// Bounds of a rectangle. Missing corners are the zero point.
    pub fn from_rectangle(rect: &Rectangle) -> Self {
        let (lo_lat, lo_lon) = rect
            .lo
            .as_ref()
            .map_or((0, 0), |p| (p.latitude, p.longitude));
        let (hi_lat, hi_lon) = rect
            .hi
            .as_ref()
            .map_or((0, 0), |p| (p.latitude, p.longitude));
        Self {
            min_latitude: lo_lat.min(hi_lat),
            max_latitude: lo_lat.max(hi_lat),
            min_longitude: lo_lon.min(hi_lon),
            max_longitude: lo_lon.max(hi_lon),
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, point: &Point) -> bool {
        (self.min_latitude..=self.max_latitude).contains(&point.latitude)
            && (self.min_longitude..=self.max_longitude).contains(&point.longitude)
    }
}

/// RouteGuide service.
///
/// Handlers are thin: they validate the request, delegate to the
/// [`FeatureRepository`] and translate storage errors to gRPC status.
pub struct RouteGuideService {
    repo: Arc<FeatureRepository>,
}

impl RouteGuideService {
    pub fn new(repo: Arc<FeatureRepository>) -> Self {
        Self { repo }
    }
}

#[tonic::async_trait]
impl RouteGuide for RouteGuideService {
    type ListFeaturesStream = ReceiverStream<Result<Feature, Status>>;

    async fn get_feature(
        &self,
        request: Request<GetFeatureRequest>,
    ) -> Result<Response<Feature>, Status> {
        let GetFeatureRequest { point, field_mask } = request.into_inner();
        let point = point.unwrap_or_default();
        info!(
            latitude = point.latitude,
            longitude = point.longitude,
            masked = field_mask::is_set(field_mask.as_ref()),
            "GetFeature"
        );

        let feature = self
            .repo
            .get_feature(&point)
            .await
            .map_err(map_storage_error)?;

        let feature = if field_mask::is_set(field_mask.as_ref()) {
            field_mask::project(&feature, field_mask.as_ref())
        } else {
            feature
        };
        Ok(Response::new(feature))
    }

    async fn list_features(
        &self,
        request: Request<Rectangle>,
    ) -> Result<Response<Self::ListFeaturesStream>, Status> {
        let bounds = Bounds::from_rectangle(request.get_ref());
        info!(bounds = ?bounds, "ListFeatures");

        let (tx, rx) = tokio::sync::mpsc::channel(LIST_CHANNEL_CAPACITY);
        let repo = self.repo.clone();

        tokio::spawn(async move {
            let features = match repo.list_features().await {
                Ok(features) => features,
                Err(e) => {
                    let _ = tx.send(Err(map_storage_error(e))).await;
                    return;
                }
            };

            let mut sent = 0usize;
            for feature in features {
                let inside = feature
                    .location
                    .as_ref()
                    .is_some_and(|location| bounds.contains(location));
                if !inside {
                    continue;
                }
                if tx.send(Ok(feature)).await.is_err() {
                    info!(sent, "ListFeatures client disconnected");
                    return;
                }
                sent += 1;
            }
            info!(sent, "ListFeatures completed");
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }

    async fn record_route(
        &self,
        request: Request<Streaming<Point>>,
    ) -> Result<Response<RouteSummary>, Status> {
        info!("RecordRoute started");
        let summary = record_route_stream(&self.repo, request.into_inner()).await?;
        Ok(Response::new(summary))
    }

    async fn update_feature(
        &self,
        request: Request<UpdateFeatureRequest>,
    ) -> Result<Response<UpdateFeatureResponse>, Status> {
        let UpdateFeatureRequest {
            feature,
            update_mask,
        } = request.into_inner();

        let feature = feature.ok_or_else(|| {
            warn!("UpdateFeature rejected: missing feature");
            Status::invalid_argument("Feature and location are required")
        })?;
        let location = feature.location.as_ref().ok_or_else(|| {
            warn!("UpdateFeature rejected: missing location");
            Status::invalid_argument("Feature and location are required")
        })?;
        let mask = match update_mask {
            Some(mask) if !mask.paths.is_empty() => mask,
            _ => {
                warn!("UpdateFeature rejected: empty update mask");
                return Err(Status::invalid_argument("Update mask cannot be empty"));
            }
        };

        info!(
            latitude = location.latitude,
            longitude = location.longitude,
            paths = ?mask.paths,
            "UpdateFeature"
        );

        let updated = self
            .repo
            .update_feature(&feature, &mask)
            .await
            .map_err(map_storage_error)?;

        Ok(Response::new(UpdateFeatureResponse {
            feature: Some(updated),
        }))
    }
}
