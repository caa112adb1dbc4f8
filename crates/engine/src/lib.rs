//! Wartime Markets Engine: conflict window drawdown analysis
//!
//! Provides:
//! - Rebasing of equity, gold and oil series to historical conflict start dates
//! - Per-event drawdown / recovery / peak-gain statistics
//! - Cross-event summary over completed episodes and a live-event snapshot
//! - Yahoo Finance client for daily history and a TTL cache for fetched series

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod config;
pub mod conflicts;
pub mod math;
pub mod types;

// Re-exports for convenience
pub use analyzer::{ConflictWindowAnalyzer, DEFAULT_WINDOW};
pub use api::{FetchError, PriceProvider, YahooClient};
pub use cache::{CacheLookup, MarketSeries, SeriesCache};
pub use config::{AnalyzerConfig, AssetSymbols};
pub use conflicts::{Event, EventMetadata, EventTable, EventTableError};
pub use types::*;
