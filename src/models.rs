//! Data models for road-risk classification, route analysis, and advisories
//!
//! This module contains the data structures shared across the engine:
//! classified weather samples, route segments, vehicle telemetry, hazard
//! alerts, and the advisory/trip output shapes.

use chrono::{DateTime, Utc};
use haversine::{Location as HaversineLocation, Units, distance};
use serde::{Deserialize, Serialize};

/// Ordered road-risk classification derived from weather conditions.
///
/// The derive order is load-bearing: aggregation takes the maximum and
/// cooldown logic compares levels, so `Low < Moderate < High < Extreme`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum RoadRisk {
    #[default]
    Low,
    Moderate,
    High,
    Extreme,
}

impl RoadRisk {
    /// Human-readable label for message text
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RoadRisk::Low => "low",
            RoadRisk::Moderate => "moderate",
            RoadRisk::High => "high",
            RoadRisk::Extreme => "extreme",
        }
    }
}

impl std::fmt::Display for RoadRisk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Canonical precipitation type after normalizing vendor weather codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrecipitationType {
    #[default]
    None,
    Rain,
    Snow,
    Hail,
}

/// Geographic coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle distance to another coordinate in kilometers
    #[must_use]
    pub fn distance_km(&self, other: &Coordinate) -> f64 {
        let from = HaversineLocation {
            latitude: self.latitude,
            longitude: self.longitude,
        };
        let to = HaversineLocation {
            latitude: other.latitude,
            longitude: other.longitude,
        };
        distance(from, to, Units::Kilometers)
    }
}

/// A classified weather observation at one point.
///
/// Always produced by the normalizer and risk classifier together
/// (`risk::build_sample`); never assemble one field by field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherSample {
    /// Temperature in Celsius
    pub temperature: f32,
    /// Relative humidity percentage (0-100)
    pub humidity: f32,
    /// Sustained wind speed in km/h
    pub wind_speed: f32,
    /// Wind gust speed in km/h
    pub wind_gust: f32,
    /// Visibility in kilometers
    pub visibility_km: f32,
    /// Precipitation intensity in mm/hr
    pub precipitation_intensity: f32,
    /// Canonical precipitation type
    pub precipitation: PrecipitationType,
    /// Severity-qualified condition text (e.g. "Heavy rain")
    pub condition: String,
    /// Provider-native weather code, normalized to the WMO table
    pub weather_code: u16,
    /// UV index
    pub uv_index: f32,
    /// Cloud cover percentage (0-100)
    pub cloud_cover: u8,
    /// Derived road-risk classification
    pub road_risk: RoadRisk,
}

/// A route geometry vertex with its distance from the route start
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutePoint {
    pub coordinate: Coordinate,
    /// Distance from the route start in km; non-decreasing along the route
    pub distance_km: f64,
}

/// A point along a route paired with its classified weather
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSegment {
    /// Distance from the route start in km; non-decreasing along the route
    pub distance_km: f64,
    pub coordinate: Coordinate,
    pub weather: WeatherSample,
}

/// Per-segment weather timeline plus the overall route classification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteAnalysis {
    /// Segments ordered by `distance_km`
    pub segments: Vec<RouteSegment>,
    /// Maximum risk across all segments. One dangerous segment dominates
    /// the route; over-warning beats under-warning.
    pub overall_risk: RoadRisk,
}

impl RouteAnalysis {
    /// Build an analysis from resolved segments, reducing to worst-case risk
    #[must_use]
    pub fn from_segments(segments: Vec<RouteSegment>) -> Self {
        let overall_risk = segments
            .iter()
            .map(|s| s.weather.road_risk)
            .max()
            .unwrap_or_default();
        Self {
            segments,
            overall_risk,
        }
    }

    /// Segment covering a position: the last segment at or before `km`,
    /// falling back to the first segment before the route start
    #[must_use]
    pub fn segment_at(&self, km: f64) -> Option<&RouteSegment> {
        self.segments
            .iter()
            .rev()
            .find(|s| s.distance_km <= km)
            .or_else(|| self.segments.first())
    }
}

/// Live vehicle telemetry read at evaluation time
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VehicleTelemetry {
    pub coordinate: Coordinate,
    /// Heading in degrees (0-360, 0 is North)
    pub bearing: f32,
    /// Ground speed in m/s
    pub speed_m_s: f32,
}

impl VehicleTelemetry {
    /// Ground speed in km/h
    #[must_use]
    pub fn speed_kmh(&self) -> f32 {
        self.speed_m_s * 3.6
    }
}

/// Progress along the active route
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RouteProgress {
    /// Distance traveled from the route start in km
    pub current_km: f64,
    /// Total route length in km
    pub total_km: f64,
}

impl RouteProgress {
    /// Remaining distance to the destination in km
    #[must_use]
    pub fn remaining_km(&self) -> f64 {
        (self.total_km - self.current_km).max(0.0)
    }
}

/// A candidate shelter location near the current route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafePlace {
    pub id: String,
    pub name: String,
    /// Kind of place (gas station, rest area, town, ...)
    pub kind: String,
    /// Distance from the vehicle in km, maintained by the caller
    pub distance_km: f64,
    pub coordinate: Coordinate,
}

/// Severity of an upstream hazard alert, ordered least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Minor,
    Moderate,
    Severe,
    Extreme,
}

/// A hazard event reported by (or derived from) a weather vendor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardAlert {
    pub id: String,
    pub severity: AlertSeverity,
    /// Event kind (e.g. "Thunderstorm", "Flood Warning")
    pub event: String,
    pub headline: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// Advisory category; one cooldown-governed family of messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryCategory {
    WeatherWarning,
    ShelterSuggestion,
    SpeedAdvisory,
    RouteUpdate,
    Arrival,
}

/// Advisory delivery priority, ordered least to most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryPriority {
    Low,
    Medium,
    High,
    Critical,
}

/// One advisory produced by an evaluation tick. Ephemeral; the engine
/// never persists these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvisoryMessage {
    pub category: AdvisoryCategory,
    pub priority: AdvisoryPriority,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl AdvisoryMessage {
    /// Whether the audio collaborator should cancel in-flight lower-priority
    /// speech for this message. Enforced by the collaborator, requested here.
    #[must_use]
    pub fn preempts_speech(&self) -> bool {
        self.priority == AdvisoryPriority::Critical
    }
}

/// Classification of a future scheduled trip against overlapping alerts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Safe,
    Caution,
    Delay,
    Danger,
}

/// Recommendation for a scheduled trip; overwritten on every recompute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TripRecommendation {
    pub status: TripStatus,
    pub message: String,
    pub details: String,
    pub suggested_delay_minutes: Option<u32>,
}
