//! Per-provider, per-day call accounting
//!
//! The ledger answers "is this provider usable right now" and "how many
//! calls remain" without knowing anything about weather. Counters are
//! keyed by `(provider, UTC day, endpoint)`; a new day simply starts new
//! keys, old rows are inert. The backing store must increment atomically
//! so concurrent route-sampling calls never lose updates.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use crate::Result;

/// Composite counter key; the UTC date makes daily reset implicit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuotaKey {
    pub provider: String,
    pub day: NaiveDate,
    pub endpoint: String,
}

/// Durable counter store with atomic upsert-increment.
///
/// Any store with an atomic increment primitive qualifies; callers must
/// never read-modify-write around this trait.
#[async_trait]
pub trait QuotaStore: Send + Sync {
    /// Atomically increment the counter for `key`, returning the new count
    async fn increment(&self, key: &QuotaKey) -> Result<u32>;

    /// Total calls recorded for `provider` on `day`, across all endpoints
    async fn used(&self, provider: &str, day: NaiveDate) -> Result<u32>;
}

/// In-memory store; the single mutex-guarded update is the atomic increment
#[derive(Default)]
pub struct MemoryQuotaStore {
    counters: Mutex<HashMap<QuotaKey, u32>>,
}

impl MemoryQuotaStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaStore for MemoryQuotaStore {
    async fn increment(&self, key: &QuotaKey) -> Result<u32> {
        let mut counters = self.counters.lock().await;
        let count = counters.entry(key.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn used(&self, provider: &str, day: NaiveDate) -> Result<u32> {
        let counters = self.counters.lock().await;
        Ok(counters
            .iter()
            .filter(|(key, _)| key.provider == provider && key.day == day)
            .map(|(_, count)| *count)
            .sum())
    }
}

/// Live quota state for one provider on the current day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub used: u32,
    pub remaining: u32,
    pub exceeded: bool,
}

/// Quota ledger shared by all provider adapters
pub struct QuotaLedger {
    store: Arc<dyn QuotaStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn QuotaStore>) -> Self {
        Self { store }
    }

    /// Ledger backed by in-process counters; suitable for a single session
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryQuotaStore::new()))
    }

    /// Current usage against a daily limit, scoped to the UTC day
    pub async fn check(&self, provider: &str, daily_limit: u32) -> Result<QuotaStatus> {
        let used = self.store.used(provider, today_utc()).await?;
        Ok(QuotaStatus {
            used,
            remaining: daily_limit.saturating_sub(used),
            exceeded: used >= daily_limit,
        })
    }

    /// Record one call against a provider endpoint.
    ///
    /// Adapters call this after every attempt, success or failure; vendors
    /// that charge failed calls are still accounted correctly.
    pub async fn record_call(&self, provider: &str, endpoint: &str) -> Result<u32> {
        let key = QuotaKey {
            provider: provider.to_string(),
            day: today_utc(),
            endpoint: endpoint.to_string(),
        };
        let count = self.store.increment(&key).await?;
        debug!(provider, endpoint, count, "recorded provider call");
        Ok(count)
    }
}

fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_reflects_recorded_calls() {
        let ledger = QuotaLedger::in_memory();

        let fresh = ledger.check("open-meteo", 3).await.unwrap();
        assert_eq!(fresh.used, 0);
        assert_eq!(fresh.remaining, 3);
        assert!(!fresh.exceeded);

        ledger.record_call("open-meteo", "forecast").await.unwrap();
        ledger.record_call("open-meteo", "hazards").await.unwrap();

        let status = ledger.check("open-meteo", 3).await.unwrap();
        assert_eq!(status.used, 2);
        assert_eq!(status.remaining, 1);
        assert!(!status.exceeded);

        ledger.record_call("open-meteo", "forecast").await.unwrap();
        let exhausted = ledger.check("open-meteo", 3).await.unwrap();
        assert_eq!(exhausted.remaining, 0);
        assert!(exhausted.exceeded);
    }

    #[tokio::test]
    async fn test_providers_are_accounted_separately() {
        let ledger = QuotaLedger::in_memory();
        ledger.record_call("open-meteo", "forecast").await.unwrap();

        let other = ledger.check("openweathermap", 10).await.unwrap();
        assert_eq!(other.used, 0);
    }

    #[tokio::test]
    async fn test_concurrent_increments_do_not_lose_updates() {
        let ledger = Arc::new(QuotaLedger::in_memory());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                ledger.record_call("open-meteo", "forecast").await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let status = ledger.check("open-meteo", 100).await.unwrap();
        assert_eq!(status.used, 50);
    }

    #[tokio::test]
    async fn test_remaining_never_underflows() {
        let ledger = QuotaLedger::in_memory();
        ledger.record_call("open-meteo", "forecast").await.unwrap();
        ledger.record_call("open-meteo", "forecast").await.unwrap();

        let status = ledger.check("open-meteo", 1).await.unwrap();
        assert_eq!(status.remaining, 0);
        assert!(status.exceeded);
    }
}
