//! Route risk aggregation
//!
//! Samples a route's coordinate sequence at bounded cardinality, resolves
//! weather per sampled point (cache first, then the provider selector),
//! and reduces per-segment risk to one overall classification using a
//! worst-case rule. One point failing never aborts the analysis; all
//! points failing escalates to `NoWeatherDataAvailable`.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::cache::WeatherCache;
use crate::error::RoadcastError;
use crate::models::{RouteAnalysis, RoutePoint, RouteSegment, WeatherSample};
use crate::provider::ProviderSelector;

/// Hard ceiling on provider calls per analysis, regardless of quota
pub const MAX_SAMPLE_POINTS: usize = 10;

/// Forecast horizon requested per sampled point
const SAMPLE_HORIZON_HOURS: u32 = 6;

pub struct RouteAnalyzer {
    selector: Arc<ProviderSelector>,
    cache: Arc<WeatherCache>,
    call_timeout: Duration,
}

impl RouteAnalyzer {
    pub fn new(
        selector: Arc<ProviderSelector>,
        cache: Arc<WeatherCache>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            selector,
            cache,
            call_timeout,
        }
    }

    /// Analyze a route's coordinate sequence.
    ///
    /// Points must be ordered by non-decreasing `distance_km`. The route
    /// is downsampled to `min(points, remaining_quota, 10)` with uniform
    /// stride, always keeping the first point.
    #[instrument(skip(self, points), fields(point_count = points.len()))]
    pub async fn analyze(&self, points: &[RoutePoint]) -> Result<RouteAnalysis> {
        if points.is_empty() {
            return Err(RoadcastError::validation("route has no points"));
        }
        if points
            .windows(2)
            .any(|pair| pair[1].distance_km < pair[0].distance_km)
        {
            return Err(RoadcastError::validation(
                "route distances must be non-decreasing",
            ));
        }

        let budget = self.selector.remaining_capacity().await as usize;
        if budget == 0 {
            return Err(RoadcastError::AllProvidersExhausted);
        }

        let step = sample_stride(points.len(), budget.min(MAX_SAMPLE_POINTS));
        let sampled: Vec<&RoutePoint> = points.iter().step_by(step).collect();
        debug!(
            sampled = sampled.len(),
            step, budget, "downsampled route for weather lookup"
        );

        // Collect all results, then reduce; a failed sibling never cancels
        // the others
        let results = join_all(sampled.iter().map(|point| self.resolve_point(point))).await;

        let mut segments = Vec::new();
        let mut saw_exhaustion = false;
        for (point, result) in sampled.iter().zip(results) {
            match result {
                Ok(sample) => segments.push(RouteSegment {
                    distance_km: point.distance_km,
                    coordinate: point.coordinate,
                    weather: sample,
                }),
                Err(e) => {
                    saw_exhaustion |= e.is_exhaustion();
                    warn!(
                        distance_km = point.distance_km,
                        "skipping route point without weather: {e}"
                    );
                }
            }
        }

        if segments.is_empty() {
            // Zero resolved points is a first-class state, never a silent
            // low-risk default
            return Err(if saw_exhaustion {
                RoadcastError::AllProvidersExhausted
            } else {
                RoadcastError::NoWeatherDataAvailable
            });
        }

        let analysis = RouteAnalysis::from_segments(segments);
        info!(
            segments = analysis.segments.len(),
            overall_risk = %analysis.overall_risk,
            "route analysis complete"
        );
        Ok(analysis)
    }

    /// Cache first, then the selected provider; successful lookups are
    /// written back with risk-scaled TTL
    async fn resolve_point(&self, point: &RoutePoint) -> Result<WeatherSample> {
        let lat = point.coordinate.latitude;
        let lng = point.coordinate.longitude;

        match self.cache.get(lat, lng).await {
            Ok(Some(sample)) => return Ok(sample),
            Ok(None) => {}
            // A broken cache degrades to a miss, not a failed point
            Err(e) => warn!("cache lookup failed, treating as miss: {e}"),
        }

        let provider = self.selector.select().await?;
        let forecast = timeout(
            self.call_timeout,
            provider.current_and_forecast(lat, lng, SAMPLE_HORIZON_HOURS),
        )
        .await
        .map_err(|_| {
            RoadcastError::provider_unavailable(provider.id().to_string(), "request timed out")
        })??;

        if let Err(e) = self.cache.put(lat, lng, &forecast.current).await {
            warn!("failed to cache weather sample: {e}");
        }
        Ok(forecast.current)
    }
}

/// Uniform stride such that `ceil(point_count / stride) <= max_points`,
/// index 0 always included
fn sample_stride(point_count: usize, max_points: usize) -> usize {
    let max_points = max_points.min(point_count).max(1);
    point_count.div_ceil(max_points)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stride_bounds_sample_count() {
        for point_count in [1usize, 2, 9, 10, 11, 100, 500, 999] {
            for max_points in [1usize, 3, 10] {
                let stride = sample_stride(point_count, max_points);
                let sampled = (0..point_count).step_by(stride).count();
                assert!(
                    sampled <= max_points.min(point_count),
                    "{point_count} points / max {max_points}: sampled {sampled}"
                );
                assert!(sampled >= 1);
            }
        }
    }

    #[test]
    fn test_stride_keeps_first_point() {
        let stride = sample_stride(500, 3);
        let indices: Vec<usize> = (0..500).step_by(stride).collect();
        assert_eq!(indices[0], 0);
        assert!(indices.len() <= 3);
    }

    #[test]
    fn test_short_route_samples_every_point() {
        assert_eq!(sample_stride(4, 10), 1);
    }
}
