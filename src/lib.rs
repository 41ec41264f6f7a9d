//! roadcast — weather-aware route risk and navigation advisory engine
//!
//! The engine turns raw weather observations into road-risk
//! classifications, aggregates them along a route, and drives a
//! navigation copilot that speaks at most one advisory per tick.
//! Scheduled trips are classified against active hazard alerts.
//!
//! Typical wiring:
//!
//! ```no_run
//! use std::sync::Arc;
//! use roadcast::config::EngineConfig;
//! use roadcast::provider::selector_from_config;
//! use roadcast::quota::{MemoryQuotaStore, QuotaLedger};
//! use roadcast::cache::WeatherCache;
//! use roadcast::route::RouteAnalyzer;
//!
//! # async fn run() -> roadcast::Result<()> {
//! let config = EngineConfig::default();
//! let ledger = Arc::new(QuotaLedger::new(Arc::new(MemoryQuotaStore::new())));
//! let selector = Arc::new(selector_from_config(&config, ledger)?);
//! let cache = Arc::new(WeatherCache::open(config.cache.resolved_location())?);
//! let analyzer = RouteAnalyzer::new(selector, cache, std::time::Duration::from_secs(10));
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod copilot;
pub mod error;
pub mod models;
pub mod provider;
pub mod quota;
pub mod risk;
pub mod route;
pub mod trip;

pub use error::RoadcastError;
pub use models::{
    AdvisoryCategory, AdvisoryMessage, AdvisoryPriority, AlertSeverity, Coordinate, HazardAlert,
    PrecipitationType, RoadRisk, RouteAnalysis, RoutePoint, RouteProgress, RouteSegment,
    SafePlace, TripRecommendation, TripStatus, VehicleTelemetry, WeatherSample,
};

/// Engine result type
pub type Result<T> = std::result::Result<T, RoadcastError>;

/// Crate version, exposed for host applications
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
