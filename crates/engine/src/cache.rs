//! Time-boxed cache of the three fetched price series
//!
//! A single async mutex guards the fetch-and-populate step, so concurrent
//! requests arriving after expiry trigger exactly one upstream fetch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::api::{FetchError, PriceProvider};
use crate::config::AssetSymbols;
use crate::types::{Asset, PriceSeries};

/// The three raw series used by one analysis
#[derive(Debug, Clone, Default)]
pub struct MarketSeries {
    pub spx: PriceSeries,
    pub gold: PriceSeries,
    pub oil: PriceSeries,
}

impl MarketSeries {
    pub fn get(&self, asset: Asset) -> &PriceSeries {
        match asset {
            Asset::Spx => &self.spx,
            Asset::Gold => &self.gold,
            Asset::Oil => &self.oil,
        }
    }
}

struct CachedSeries {
    fetched_at: Instant,
    series: Arc<MarketSeries>,
}

/// Result of a cache lookup
#[derive(Debug, Clone)]
pub struct CacheLookup {
    pub series: Arc<MarketSeries>,
    /// True when this lookup fetched fresh data from the provider
    pub refreshed: bool,
}

pub struct SeriesCache<P: PriceProvider> {
    provider: P,
    symbols: AssetSymbols,
    ttl: Duration,
    entry: Mutex<Option<CachedSeries>>,
}

impl<P: PriceProvider> SeriesCache<P> {
    pub fn new(provider: P, symbols: AssetSymbols, ttl: Duration) -> Self {
        Self {
            provider,
            symbols,
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached series if still fresh, otherwise fetch all three.
    ///
    /// A failed fetch propagates and leaves the previous entry in place; an
    /// expired entry is never served.
    pub async fn get_or_fetch(&self) -> Result<CacheLookup, FetchError> {
        let mut entry = self.entry.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!(age_secs = cached.fetched_at.elapsed().as_secs(), "Series cache hit");
                return Ok(CacheLookup {
                    series: cached.series.clone(),
                    refreshed: false,
                });
            }
        }

        info!(
            spx = %self.symbols.spx,
            gold = %self.symbols.gold,
            oil = %self.symbols.oil,
            "Fetching market series"
        );

        let (spx, gold, oil) = tokio::try_join!(
            self.provider.fetch_series(&self.symbols.spx),
            self.provider.fetch_series(&self.symbols.gold),
            self.provider.fetch_series(&self.symbols.oil),
        )
        .map_err(|e| {
            warn!(error = %e, "Market series fetch failed");
            e
        })?;

        let series = Arc::new(MarketSeries { spx, gold, oil });
        *entry = Some(CachedSeries {
            fetched_at: Instant::now(),
            series: series.clone(),
        });

        Ok(CacheLookup {
            series,
            refreshed: true,
        })
    }

    /// Drop the cached entry so the next lookup refetches
    pub async fn invalidate(&self) {
        *self.entry.lock().await = None;
    }
}
