//! Grid-quantized weather response cache
//!
//! Coordinates are rounded to two decimal places (~1 km cells) so dense
//! route sampling collapses onto shared keys; the loss of precision is
//! the mechanism behind the hit rate. TTL scales inversely with the
//! cached sample's risk: the worse the conditions, the sooner stale data
//! stops being trusted.

use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fjall::Keyspace;
use serde::{Deserialize, Serialize};
use tokio::task;
use tracing::debug;

use crate::Result;
use crate::error::RoadcastError;
use crate::models::{RoadRisk, WeatherSample};

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    value: WeatherSample,
    expires_at: u64, // Unix timestamp (seconds)
}

pub struct WeatherCache {
    store: Keyspace,
}

impl WeatherCache {
    /// Opens (or creates) the cache database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = fjall::Database::builder(&path)
            .open()
            .map_err(|e| RoadcastError::cache(format!("failed to open cache database: {e}")))?;
        let store = db
            .keyspace("weather", fjall::KeyspaceCreateOptions::default)
            .map_err(|e| RoadcastError::cache(e.to_string()))?;
        Ok(WeatherCache { store })
    }

    /// Retrieves the sample for the grid cell containing `(lat, lng)`.
    /// Returns `None` for misses and for entries at or past expiry.
    #[tracing::instrument(name = "query_weather_cache", level = "debug", skip(self))]
    pub async fn get(&self, lat: f64, lng: f64) -> Result<Option<WeatherSample>> {
        let key = grid_key(lat, lng);
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();

        let maybe_bytes: Option<Vec<u8>> =
            task::spawn_blocking(move || store.get(key_bytes).map(|v| v.map(|v| v.to_vec())))
                .await
                .map_err(|e| RoadcastError::cache(e.to_string()))?
                .map_err(|e| RoadcastError::cache(e.to_string()))?;

        let Some(bytes) = maybe_bytes else {
            debug!(key, "cache miss");
            return Ok(None);
        };

        let entry: StoredEntry = postcard::from_bytes(&bytes)
            .map_err(|e| RoadcastError::cache(format!("corrupt cache entry: {e}")))?;
        let now = unix_now()?;

        if now < entry.expires_at {
            debug!(key, "cache hit");
            Ok(Some(entry.value))
        } else {
            debug!(key, "cache entry expired");
            self.remove(&key).await?;
            Ok(None)
        }
    }

    /// Stores a sample at the grid cell containing `(lat, lng)`, with TTL
    /// derived from the sample's own risk classification
    #[tracing::instrument(name = "put_weather_cache", level = "debug", skip(self, sample))]
    pub async fn put(&self, lat: f64, lng: f64, sample: &WeatherSample) -> Result<()> {
        let key = grid_key(lat, lng);
        let ttl = ttl_for_risk(sample.road_risk);
        let expires_at = unix_now()? + ttl.as_secs();

        let entry = StoredEntry {
            value: sample.clone(),
            expires_at,
        };
        let bytes =
            postcard::to_stdvec(&entry).map_err(|e| RoadcastError::cache(e.to_string()))?;

        let store = self.store.clone();
        let key_bytes = key.into_bytes();
        task::spawn_blocking(move || store.insert(key_bytes, bytes))
            .await
            .map_err(|e| RoadcastError::cache(e.to_string()))?
            .map_err(|e| RoadcastError::cache(e.to_string()))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let store = self.store.clone();
        let key_bytes = key.as_bytes().to_vec();
        task::spawn_blocking(move || store.remove(key_bytes))
            .await
            .map_err(|e| RoadcastError::cache(e.to_string()))?
            .map_err(|e| RoadcastError::cache(e.to_string()))?;
        Ok(())
    }
}

/// TTL is inversely proportional to risk severity: riskier conditions
/// mean less trust in stale data
#[must_use]
pub fn ttl_for_risk(risk: RoadRisk) -> Duration {
    match risk {
        RoadRisk::Extreme => Duration::from_secs(2 * 60),
        RoadRisk::High => Duration::from_secs(5 * 60),
        RoadRisk::Moderate => Duration::from_secs(10 * 60),
        RoadRisk::Low => Duration::from_secs(15 * 60),
    }
}

/// Deterministic grid key: round-half-away-from-zero at 2 decimal places
/// (~1 km cells), so nearby coordinates share an entry
#[must_use]
pub fn grid_key(lat: f64, lng: f64) -> String {
    format!("weather:{:.2}:{:.2}", quantize(lat), quantize(lng))
}

fn quantize(value: f64) -> f64 {
    // f64::round is round-half-away-from-zero
    (value * 100.0).round() / 100.0
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| RoadcastError::cache(e.to_string()))?
        .as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{RawReading, build_sample};

    fn temp_cache() -> WeatherCache {
        let dir = std::env::temp_dir().join(format!(
            "roadcast-cache-test-{}-{}",
            std::process::id(),
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        WeatherCache::open(dir).unwrap()
    }

    #[test]
    fn test_ttl_inversely_proportional_to_risk() {
        assert!(ttl_for_risk(RoadRisk::Extreme) < ttl_for_risk(RoadRisk::High));
        assert!(ttl_for_risk(RoadRisk::High) < ttl_for_risk(RoadRisk::Moderate));
        assert!(ttl_for_risk(RoadRisk::Moderate) < ttl_for_risk(RoadRisk::Low));
    }

    #[test]
    fn test_grid_key_collapses_nearby_points() {
        // Within the same ~1 km cell
        assert_eq!(grid_key(48.1351, 11.5820), grid_key(48.1399, 11.5751));
        // Different cells
        assert_ne!(grid_key(48.13, 11.58), grid_key(48.14, 11.58));
    }

    #[test]
    fn test_grid_key_rounds_half_away_from_zero() {
        assert_eq!(grid_key(48.125, 11.375), "weather:48.13:11.38");
        assert_eq!(grid_key(-48.125, -11.375), "weather:-48.13:-11.38");
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let cache = temp_cache();
        let sample = build_sample(RawReading {
            temperature: 10.0,
            visibility_km: 10.0,
            ..RawReading::default()
        });

        cache.put(48.1351, 11.5820, &sample).await.unwrap();

        // A nearby coordinate in the same grid cell hits the same entry
        let hit = cache.get(48.1399, 11.5751).await.unwrap();
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().temperature, 10.0);

        let miss = cache.get(50.0, 8.0).await.unwrap();
        assert!(miss.is_none());
    }
}
