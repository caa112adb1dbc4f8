//! Types for the conflict window analysis

use chrono::NaiveDate;
use serde::ser::{SerializeStruct, Serializer};
use serde::{Deserialize, Serialize};

use crate::conflicts::EventMetadata;
use crate::math::round_to;

/// Decimal places used for rebased chart values
pub const CHART_DECIMALS: u32 = 6;

/// Role of an asset in the analysis; selects the statistics variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    Index,
    Commodity,
}

/// The three tracked underlyings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Asset {
    Spx,
    Gold,
    Oil,
}

impl Asset {
    pub const ALL: [Asset; 3] = [Asset::Spx, Asset::Gold, Asset::Oil];

    pub fn role(&self) -> AssetRole {
        match self {
            Self::Spx => AssetRole::Index,
            Self::Gold | Self::Oil => AssetRole::Commodity,
        }
    }

    /// Key used in the JSON response body
    pub fn key(&self) -> &'static str {
        match self {
            Self::Spx => "spx",
            Self::Gold => "gold",
            Self::Oil => "oil",
        }
    }

    pub fn default_symbol(&self) -> &'static str {
        match self {
            Self::Spx => "^GSPC",
            Self::Gold => "GC=F",
            Self::Oil => "CL=F",
        }
    }
}

impl std::fmt::Display for Asset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// A single daily observation. `close` is `None` when the provider has no value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: Option<f64>) -> Self {
        Self { date, close }
    }

    /// The close if it is usable as a price (finite and strictly positive)
    pub fn valid_close(&self) -> Option<f64> {
        self.close.filter(|c| c.is_finite() && *c > 0.0)
    }
}

/// Date-indexed price history for one symbol, strictly increasing by date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Build a series, sorting by date and keeping the last observation per date
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(last) if last.date == point.date => *last = point,
                _ => deduped.push(point),
            }
        }
        Self {
            symbol: symbol.into(),
            points: deduped,
        }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of observations with a usable close
    pub fn valid_len(&self) -> usize {
        self.points.iter().filter(|p| p.valid_close().is_some()).count()
    }

    /// Observations on or after `date`
    pub fn since(&self, date: NaiveDate) -> &[PricePoint] {
        let start = self.points.partition_point(|p| p.date < date);
        &self.points[start..]
    }
}

/// A price path rebased to 1.0 at the event start, indexed by trading-day offset
#[derive(Debug, Clone, PartialEq)]
pub struct RebasedWindow {
    pub event: String,
    pub values: Vec<f64>,
}

impl RebasedWindow {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn x(&self) -> Vec<usize> {
        (0..self.values.len()).collect()
    }

    pub fn y(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|v| round_to(*v, CHART_DECIMALS))
            .collect()
    }
}

impl Serialize for RebasedWindow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RebasedWindow", 2)?;
        state.serialize_field("x", &self.x())?;
        state.serialize_field("y", &self.y())?;
        state.end()
    }
}

/// Drawdown and recovery statistics for an equity index window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStatistics {
    pub conflict: String,
    pub mdd: f64,
    pub days_to_bottom: usize,
    pub recovery_days: Option<usize>,
    pub final_return: f64,
    pub days_avail: usize,
    pub note: Option<String>,
    #[serde(skip)]
    pub current: bool,
}

/// Peak gain and drawdown statistics for a commodity window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommodityStatistics {
    pub conflict: String,
    pub peak_gain: f64,
    pub days_to_peak: usize,
    pub mdd: f64,
    pub final_return: f64,
    pub days_avail: usize,
    pub note: Option<String>,
    #[serde(skip)]
    pub current: bool,
}

/// Per-event statistics, one variant per asset role
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventStatistics {
    Index(IndexStatistics),
    Commodity(CommodityStatistics),
}

impl EventStatistics {
    pub fn conflict(&self) -> &str {
        match self {
            Self::Index(s) => &s.conflict,
            Self::Commodity(s) => &s.conflict,
        }
    }
}

/// Cross-event aggregates over completed (non-live) index episodes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    pub avg_mdd: Option<f64>,
    pub avg_bottom_days: Option<f64>,
    pub avg_recovery_days: Option<f64>,
    pub recovery_rate: Option<f64>,
}

/// Point-in-time view of the live event across the three assets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentEventSnapshot {
    pub name: String,
    pub spx_days_elapsed: usize,
    pub spx_return: Option<f64>,
    pub spx_low: Option<f64>,
    pub gold_return: Option<f64>,
    pub oil_return: Option<f64>,
}

/// Rebased paths and statistics for one asset
#[derive(Debug, Clone, Default, Serialize)]
pub struct AssetAnalysis {
    #[serde(serialize_with = "crate::conflicts::serialize_ordered_windows")]
    pub rebased: Vec<RebasedWindow>,
    pub stats: Vec<EventStatistics>,
}

impl AssetAnalysis {
    pub fn window(&self, event: &str) -> Option<&RebasedWindow> {
        self.rebased.iter().find(|w| w.event == event)
    }
}

/// Complete output of one analysis invocation
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    #[serde(serialize_with = "crate::conflicts::serialize_ordered_metadata")]
    pub conflicts: Vec<EventMetadata>,
    pub spx: AssetAnalysis,
    pub gold: AssetAnalysis,
    pub oil: AssetAnalysis,
    pub current: Option<CurrentEventSnapshot>,
    pub summary: SummaryStatistics,
}

impl AnalysisResult {
    pub fn asset(&self, asset: Asset) -> &AssetAnalysis {
        match asset {
            Asset::Spx => &self.spx,
            Asset::Gold => &self.gold,
            Asset::Oil => &self.oil,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_series_sorted_and_deduplicated() {
        let series = PriceSeries::new(
            "^GSPC",
            vec![
                PricePoint::new(d(2020, 1, 3), Some(3.0)),
                PricePoint::new(d(2020, 1, 1), Some(1.0)),
                PricePoint::new(d(2020, 1, 3), Some(4.0)),
                PricePoint::new(d(2020, 1, 2), None),
            ],
        );
        let dates: Vec<_> = series.points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![d(2020, 1, 1), d(2020, 1, 2), d(2020, 1, 3)]);
        assert_eq!(series.points()[2].close, Some(4.0));
        assert_eq!(series.valid_len(), 2);
    }

    #[test]
    fn test_invalid_closes_are_missing() {
        assert_eq!(PricePoint::new(d(2020, 1, 1), Some(0.0)).valid_close(), None);
        assert_eq!(PricePoint::new(d(2020, 1, 1), Some(-5.0)).valid_close(), None);
        assert_eq!(PricePoint::new(d(2020, 1, 1), Some(f64::NAN)).valid_close(), None);
        assert_eq!(PricePoint::new(d(2020, 1, 1), Some(12.5)).valid_close(), Some(12.5));
    }

    #[test]
    fn test_since_includes_start_date() {
        let series = PriceSeries::new(
            "GC=F",
            (1..=5)
                .map(|i| PricePoint::new(d(2021, 3, i), Some(i as f64)))
                .collect(),
        );
        assert_eq!(series.since(d(2021, 3, 3)).len(), 3);
        assert_eq!(series.since(d(2021, 3, 6)).len(), 0);
        assert_eq!(series.since(d(2000, 1, 1)).len(), 5);
    }

    #[test]
    fn test_rebased_window_serializes_offsets() {
        let window = RebasedWindow {
            event: "Test".into(),
            values: vec![1.0, 0.123_456_789, 1.5],
        };
        let json = serde_json::to_value(&window).unwrap();
        assert_eq!(json["x"], serde_json::json!([0, 1, 2]));
        assert_eq!(json["y"], serde_json::json!([1.0, 0.123457, 1.5]));
    }
}
