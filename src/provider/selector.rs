//! Provider selection with quota-aware fallback
//!
//! Walks the provider list in strategy order and returns the first
//! adapter reporting itself available. Exhaustion is a hard error for
//! the caller; the response cache is a separate concern consulted
//! before selection, never a fallback inside the selector.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::error::RoadcastError;
use crate::provider::WeatherProvider;

/// Policy knob for ordering candidate providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// Prefer the cheapest provider with remaining quota
    #[default]
    CostOptimized,
    /// Prefer the lowest-latency provider
    Performance,
    /// Prefer the historically most reliable provider
    Reliability,
}

/// Chooses the best available provider adapter for each call
pub struct ProviderSelector {
    providers: Vec<Arc<dyn WeatherProvider>>,
    strategy: SelectionStrategy,
}

impl ProviderSelector {
    /// `providers` is the priority order used to break ranking ties
    pub fn new(providers: Vec<Arc<dyn WeatherProvider>>, strategy: SelectionStrategy) -> Self {
        Self {
            providers,
            strategy,
        }
    }

    /// First available provider in strategy order.
    ///
    /// Returns [`RoadcastError::AllProvidersExhausted`] when no adapter
    /// reports itself usable; callers must treat that as a first-class
    /// "no weather data" state, not degrade silently.
    pub async fn select(&self) -> Result<Arc<dyn WeatherProvider>> {
        for provider in self.ordered() {
            if provider.is_available().await {
                debug!(provider = provider.id(), "selected weather provider");
                return Ok(Arc::clone(provider));
            }
            debug!(
                provider = provider.id(),
                "provider unavailable, trying next"
            );
        }
        Err(RoadcastError::AllProvidersExhausted)
    }

    /// Total calls remaining today across all configured providers
    pub async fn remaining_capacity(&self) -> u32 {
        let mut total: u32 = 0;
        for provider in &self.providers {
            total = total.saturating_add(provider.remaining_quota().await);
        }
        total
    }

    fn ordered(&self) -> Vec<&Arc<dyn WeatherProvider>> {
        let mut ordered: Vec<(usize, &Arc<dyn WeatherProvider>)> =
            self.providers.iter().enumerate().collect();
        ordered.sort_by_key(|(index, provider)| {
            let profile = provider.profile();
            let rank = match self.strategy {
                SelectionStrategy::CostOptimized => profile.cost_rank,
                SelectionStrategy::Performance => profile.latency_rank,
                SelectionStrategy::Reliability => profile.reliability_rank,
            };
            (rank, *index)
        });
        ordered.into_iter().map(|(_, provider)| provider).collect()
    }
}
