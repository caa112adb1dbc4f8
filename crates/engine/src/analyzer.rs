//! Conflict window analyzer: rebasing, drawdown/recovery, cross-event summary
//!
//! For every event in the table, a price series is sliced from the event's start
//! date, truncated to `window` observations and rebased to 1.0. Each rebased path
//! yields per-event statistics; the index statistics of completed episodes are
//! aggregated into a summary. Short or missing windows are omitted, never errors.

use tracing::{debug, info, warn};

use crate::conflicts::{Event, EventTable};
use crate::math::{argmax, argmin, mean, round_to};
use crate::types::*;

/// Maximum number of observations in a rebased window
pub const DEFAULT_WINDOW: usize = 200;

/// Decimal places for statistics
const STAT_DECIMALS: u32 = 4;
/// Decimal places for averaged day counts
const DAY_DECIMALS: u32 = 1;

/// Stateless analyzer parameterised by the window length
#[derive(Debug, Clone, Copy)]
pub struct ConflictWindowAnalyzer {
    window: usize,
}

impl Default for ConflictWindowAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ConflictWindowAnalyzer {
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Slice, truncate and rebase `prices` for each event, in table order.
    ///
    /// Events with fewer than two valid observations from their start date are
    /// absent from the result.
    pub fn build_rebased_windows(
        &self,
        prices: &PriceSeries,
        events: &EventTable,
    ) -> Vec<RebasedWindow> {
        events
            .iter()
            .filter_map(|event| self.rebase_event(prices, event))
            .collect()
    }

    fn rebase_event(&self, prices: &PriceSeries, event: &Event) -> Option<RebasedWindow> {
        let raw: Vec<f64> = prices
            .since(event.start_date)
            .iter()
            .filter_map(|p| p.valid_close())
            .take(self.window)
            .collect();

        if raw.len() < 2 {
            debug!(
                symbol = %prices.symbol,
                event = %event.name,
                points = raw.len(),
                "Skipping event: insufficient data for window"
            );
            return None;
        }

        let base = raw[0];
        Some(RebasedWindow {
            event: event.name.clone(),
            values: raw.iter().map(|v| v / base).collect(),
        })
    }

    /// Drawdown, trough offset and recovery statistics for equity windows
    pub fn compute_index_statistics(
        &self,
        windows: &[RebasedWindow],
        events: &EventTable,
    ) -> Vec<IndexStatistics> {
        windows
            .iter()
            .filter(|w| w.len() >= 2)
            .map(|w| {
                let s = &w.values;
                let (mdd, days_to_bottom) = max_drawdown(s);
                let recovery_days = s[days_to_bottom..]
                    .iter()
                    .position(|&v| v >= 1.0);
                let event = events.get(&w.event);

                IndexStatistics {
                    conflict: w.event.clone(),
                    mdd: round_to(mdd, STAT_DECIMALS),
                    days_to_bottom,
                    recovery_days,
                    final_return: round_to(s[s.len() - 1] - 1.0, STAT_DECIMALS),
                    days_avail: s.len(),
                    note: event.and_then(|e| e.note.clone()),
                    current: event.map(|e| e.current).unwrap_or(false),
                }
            })
            .collect()
    }

    /// Peak gain and full-window drawdown statistics for commodity windows
    pub fn compute_commodity_statistics(
        &self,
        windows: &[RebasedWindow],
        events: &EventTable,
    ) -> Vec<CommodityStatistics> {
        windows
            .iter()
            .filter(|w| w.len() >= 2)
            .map(|w| {
                let s = &w.values;
                let days_to_peak = argmax(s).unwrap_or(0);
                // Drawdown spans the whole window, including any dip before the peak.
                let (mdd, _) = max_drawdown(s);
                let event = events.get(&w.event);

                CommodityStatistics {
                    conflict: w.event.clone(),
                    peak_gain: round_to(s[days_to_peak] - 1.0, STAT_DECIMALS),
                    days_to_peak,
                    mdd: round_to(mdd, STAT_DECIMALS),
                    final_return: round_to(s[s.len() - 1] - 1.0, STAT_DECIMALS),
                    days_avail: s.len(),
                    note: event.and_then(|e| e.note.clone()),
                    current: event.map(|e| e.current).unwrap_or(false),
                }
            })
            .collect()
    }

    /// Aggregate the completed (non-live) index episodes
    pub fn compute_summary(&self, index_statistics: &[IndexStatistics]) -> SummaryStatistics {
        let historical: Vec<&IndexStatistics> =
            index_statistics.iter().filter(|s| !s.current).collect();

        if historical.is_empty() {
            return SummaryStatistics::default();
        }

        let recovered: Vec<usize> = historical.iter().filter_map(|s| s.recovery_days).collect();

        SummaryStatistics {
            avg_mdd: mean(historical.iter().map(|s| s.mdd)).map(|v| round_to(v, STAT_DECIMALS)),
            avg_bottom_days: mean(historical.iter().map(|s| s.days_to_bottom as f64))
                .map(|v| round_to(v, DAY_DECIMALS)),
            avg_recovery_days: mean(recovered.iter().map(|&d| d as f64))
                .map(|v| round_to(v, DAY_DECIMALS)),
            recovery_rate: Some(round_to(
                recovered.len() as f64 / historical.len() as f64,
                STAT_DECIMALS,
            )),
        }
    }

    /// Point-in-time snapshot of the live event from its (possibly absent) windows
    pub fn build_current_snapshot(
        &self,
        current_event_name: &str,
        index_window: Option<&RebasedWindow>,
        gold_window: Option<&RebasedWindow>,
        oil_window: Option<&RebasedWindow>,
    ) -> CurrentEventSnapshot {
        let point_return =
            |w: Option<&RebasedWindow>| w.and_then(|w| w.last()).map(|v| round_to(v - 1.0, STAT_DECIMALS));

        CurrentEventSnapshot {
            name: current_event_name.to_string(),
            spx_days_elapsed: index_window.map(|w| w.len().saturating_sub(1)).unwrap_or(0),
            spx_return: point_return(index_window),
            spx_low: index_window
                .and_then(|w| argmin(&w.values).map(|i| w.values[i]))
                .map(|v| round_to(v - 1.0, STAT_DECIMALS)),
            gold_return: point_return(gold_window),
            oil_return: point_return(oil_window),
        }
    }

    /// Rebased windows and role-specific statistics for one asset
    pub fn analyze_asset(
        &self,
        asset: Asset,
        prices: &PriceSeries,
        events: &EventTable,
    ) -> AssetAnalysis {
        if prices.valid_len() == 0 {
            warn!(
                asset = %asset,
                symbol = %prices.symbol,
                "No usable prices; statistics unavailable for this asset"
            );
            return AssetAnalysis::default();
        }

        let rebased = self.build_rebased_windows(prices, events);
        let stats = match asset.role() {
            AssetRole::Index => self
                .compute_index_statistics(&rebased, events)
                .into_iter()
                .map(EventStatistics::Index)
                .collect(),
            AssetRole::Commodity => self
                .compute_commodity_statistics(&rebased, events)
                .into_iter()
                .map(EventStatistics::Commodity)
                .collect(),
        };

        debug!(
            asset = %asset,
            windows = rebased.len(),
            events = events.len(),
            "Asset analysis complete"
        );

        AssetAnalysis { rebased, stats }
    }

    /// Run the full analysis over the three series
    pub fn analyze(
        &self,
        equity: &PriceSeries,
        gold: &PriceSeries,
        oil: &PriceSeries,
        events: &EventTable,
    ) -> AnalysisResult {
        let spx = self.analyze_asset(Asset::Spx, equity, events);
        let gold = self.analyze_asset(Asset::Gold, gold, events);
        let oil = self.analyze_asset(Asset::Oil, oil, events);

        let index_stats: Vec<IndexStatistics> = spx
            .stats
            .iter()
            .filter_map(|s| match s {
                EventStatistics::Index(s) => Some(s.clone()),
                EventStatistics::Commodity(_) => None,
            })
            .collect();
        let summary = self.compute_summary(&index_stats);

        let current = events.current().map(|event| {
            self.build_current_snapshot(
                &event.name,
                spx.window(&event.name),
                gold.window(&event.name),
                oil.window(&event.name),
            )
        });

        info!(
            events = events.len(),
            spx_windows = spx.rebased.len(),
            gold_windows = gold.rebased.len(),
            oil_windows = oil.rebased.len(),
            "Conflict analysis complete"
        );

        AnalysisResult {
            conflicts: events.metadata(),
            spx,
            gold,
            oil,
            current,
            summary,
        }
    }
}

/// Most negative drawdown from the running peak and its offset (first on ties)
fn max_drawdown(values: &[f64]) -> (f64, usize) {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0;
    let mut worst_at = 0;
    for (i, &v) in values.iter().enumerate() {
        peak = peak.max(v);
        let drawdown = (v - peak) / peak;
        if drawdown < worst {
            worst = drawdown;
            worst_at = i;
        }
    }
    (worst, worst_at)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(1990, 8, 2).unwrap()
    }

    fn make_series(symbol: &str, first: NaiveDate, closes: &[Option<f64>]) -> PriceSeries {
        PriceSeries::new(
            symbol,
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| PricePoint::new(first + Duration::days(i as i64), c))
                .collect(),
        )
    }

    fn prices(symbol: &str, closes: &[f64]) -> PriceSeries {
        let closes: Vec<Option<f64>> = closes.iter().map(|&c| Some(c)).collect();
        make_series(symbol, start(), &closes)
    }

    fn single_event() -> EventTable {
        EventTable::new(vec![Event::new("Gulf War (1990)", start())]).unwrap()
    }

    fn index_stats(series: &PriceSeries, events: &EventTable) -> Vec<IndexStatistics> {
        let analyzer = ConflictWindowAnalyzer::default();
        let windows = analyzer.build_rebased_windows(series, events);
        analyzer.compute_index_statistics(&windows, events)
    }

    fn stat(conflict: &str, mdd: f64, bottom: usize, recovery: Option<usize>) -> IndexStatistics {
        IndexStatistics {
            conflict: conflict.into(),
            mdd,
            days_to_bottom: bottom,
            recovery_days: recovery,
            final_return: 0.0,
            days_avail: 10,
            note: None,
            current: false,
        }
    }

    #[test]
    fn test_rebased_scenario() {
        let series = prices("^GSPC", &[100.0, 90.0, 80.0, 85.0, 95.0, 101.0]);
        let windows = ConflictWindowAnalyzer::default().build_rebased_windows(&series, &single_event());

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].x(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(windows[0].y(), vec![1.0, 0.9, 0.8, 0.85, 0.95, 1.01]);
    }

    #[test]
    fn test_index_statistics_with_recovery() {
        let series = prices("^GSPC", &[100.0, 90.0, 80.0, 85.0, 95.0, 101.0]);
        let stats = index_stats(&series, &single_event());

        assert_eq!(stats.len(), 1);
        let s = &stats[0];
        assert_eq!(s.conflict, "Gulf War (1990)");
        assert_eq!(s.mdd, -0.2);
        assert_eq!(s.days_to_bottom, 2);
        assert_eq!(s.recovery_days, Some(3));
        assert_eq!(s.final_return, 0.01);
        assert_eq!(s.days_avail, 6);
    }

    #[test]
    fn test_index_statistics_without_recovery() {
        let series = prices("^GSPC", &[100.0, 90.0, 80.0]);
        let stats = index_stats(&series, &single_event());

        assert_eq!(stats[0].recovery_days, None);
        assert_eq!(stats[0].final_return, -0.2);
        assert_eq!(stats[0].days_to_bottom, 2);
    }

    #[test]
    fn test_event_after_last_price_is_omitted() {
        let series = prices("^GSPC", &[100.0, 101.0, 102.0]);
        let events = EventTable::new(vec![
            Event::new("Gulf War (1990)", start()),
            Event::new("Future", start() + Duration::days(30)),
        ])
        .unwrap();

        let analyzer = ConflictWindowAnalyzer::default();
        let windows = analyzer.build_rebased_windows(&series, &events);
        assert_eq!(windows.len(), 1);
        assert!(windows.iter().all(|w| w.event != "Future"));

        let result = analyzer.analyze(&series, &series, &series, &events);
        for asset in Asset::ALL {
            let analysis = result.asset(asset);
            assert!(analysis.window("Future").is_none());
            assert!(analysis.stats.iter().all(|s| s.conflict() != "Future"));
        }
    }

    #[test]
    fn test_single_point_window_is_omitted() {
        let series = prices("^GSPC", &[100.0, 101.0, 102.0]);
        let events = EventTable::new(vec![Event::new("Last Day", start() + Duration::days(2))]).unwrap();

        let analyzer = ConflictWindowAnalyzer::default();
        assert!(analyzer.build_rebased_windows(&series, &events).is_empty());
        assert!(index_stats(&series, &events).is_empty());
    }

    #[test]
    fn test_missing_values_dropped_before_truncation() {
        let series = make_series(
            "^GSPC",
            start(),
            &[None, Some(50.0), None, Some(55.0), Some(f64::NAN), Some(45.0)],
        );
        let analyzer = ConflictWindowAnalyzer::new(2);
        let windows = analyzer.build_rebased_windows(&series, &single_event());

        assert_eq!(windows[0].values, vec![1.0, 1.1]);
    }

    #[test]
    fn test_window_truncated_and_starts_at_one() {
        let closes: Vec<f64> = (0..300).map(|i| 100.0 + (i as f64 * 0.37).sin() * 20.0).collect();
        let series = prices("^GSPC", &closes);
        let windows = ConflictWindowAnalyzer::default().build_rebased_windows(&series, &single_event());

        assert_eq!(windows[0].len(), DEFAULT_WINDOW);
        assert_eq!(windows[0].values[0], 1.0);
        assert_eq!(windows[0].y()[0], 1.0);
    }

    #[test]
    fn test_start_date_on_non_trading_day_uses_next_observation() {
        let series = make_series("^GSPC", start(), &[Some(100.0), None, Some(80.0), Some(88.0)]);
        let events =
            EventTable::new(vec![Event::new("Weekend", start() + Duration::days(1))]).unwrap();
        let windows = ConflictWindowAnalyzer::default().build_rebased_windows(&series, &events);

        assert_eq!(windows[0].values, vec![1.0, 1.1]);
    }

    #[test]
    fn test_index_properties_hold_on_oscillating_paths() {
        let closes: Vec<f64> = (0..250)
            .map(|i| 100.0 + (i as f64 * 0.11).sin() * 15.0 - i as f64 * 0.02)
            .collect();
        let series = prices("^GSPC", &closes);
        let events = EventTable::new(
            (0..20)
                .map(|i| Event::new(format!("E{i}"), start() + Duration::days(i * 11)))
                .collect(),
        )
        .unwrap();

        let analyzer = ConflictWindowAnalyzer::default();
        let windows = analyzer.build_rebased_windows(&series, &events);
        let stats = analyzer.compute_index_statistics(&windows, &events);
        assert_eq!(stats.len(), windows.len());

        for (w, s) in windows.iter().zip(&stats) {
            assert!(s.mdd <= 0.0);
            assert!(s.days_to_bottom < s.days_avail);
            if let Some(r) = s.recovery_days {
                let at = s.days_to_bottom + r;
                assert!(w.values[at] >= 1.0);
                for offset in s.days_to_bottom..at {
                    assert!(w.values[offset] < 1.0);
                }
            }
        }
    }

    #[test]
    fn test_drawdown_ties_take_first_trough() {
        let series = prices("^GSPC", &[100.0, 80.0, 100.0, 80.0, 90.0]);
        let stats = index_stats(&series, &single_event());

        assert_eq!(stats[0].days_to_bottom, 1);
        assert_eq!(stats[0].recovery_days, Some(1));
    }

    #[test]
    fn test_recovery_at_bottom_when_no_drawdown() {
        let series = prices("^GSPC", &[100.0, 105.0, 110.0]);
        let stats = index_stats(&series, &single_event());

        assert_eq!(stats[0].mdd, 0.0);
        assert_eq!(stats[0].days_to_bottom, 0);
        assert_eq!(stats[0].recovery_days, Some(0));
    }

    #[test]
    fn test_drawdown_measured_from_running_peak() {
        // Peak at 1.2 then fall to 0.9 → drawdown -25% although still below start
        let series = prices("^GSPC", &[100.0, 120.0, 90.0, 95.0]);
        let stats = index_stats(&series, &single_event());

        assert_eq!(stats[0].mdd, -0.25);
        assert_eq!(stats[0].days_to_bottom, 2);
        assert_eq!(stats[0].recovery_days, None);
    }

    #[test]
    fn test_commodity_statistics() {
        let series = prices("GC=F", &[100.0, 80.0, 130.0, 120.0, 130.0, 110.0]);
        let analyzer = ConflictWindowAnalyzer::default();
        let events = single_event();
        let windows = analyzer.build_rebased_windows(&series, &events);
        let stats = analyzer.compute_commodity_statistics(&windows, &events);

        let s = &stats[0];
        assert_eq!(s.peak_gain, 0.3);
        assert_eq!(s.days_to_peak, 2);
        // The pre-peak dip (-20%) dominates the post-peak decline (-15.38%)
        assert_eq!(s.mdd, -0.2);
        assert_eq!(s.final_return, 0.1);
        assert_eq!(s.days_avail, 6);
    }

    #[test]
    fn test_summary_mixed_recovery() {
        let stats = vec![stat("A", -0.1, 4, Some(5)), stat("B", -0.3, 10, None)];
        let summary = ConflictWindowAnalyzer::default().compute_summary(&stats);

        assert_eq!(summary.recovery_rate, Some(0.5));
        assert_eq!(summary.avg_recovery_days, Some(5.0));
        assert_eq!(summary.avg_mdd, Some(-0.2));
        assert_eq!(summary.avg_bottom_days, Some(7.0));
    }

    #[test]
    fn test_summary_excludes_current_event() {
        let mut live = stat("Live", -0.9, 50, None);
        live.current = true;
        let stats = vec![stat("A", -0.1, 3, Some(2)), live];
        let summary = ConflictWindowAnalyzer::default().compute_summary(&stats);

        assert_eq!(summary.avg_mdd, Some(-0.1));
        assert_eq!(summary.avg_bottom_days, Some(3.0));
        assert_eq!(summary.recovery_rate, Some(1.0));
    }

    #[test]
    fn test_summary_empty_is_all_null() {
        let analyzer = ConflictWindowAnalyzer::default();
        assert_eq!(analyzer.compute_summary(&[]), SummaryStatistics::default());

        let mut live = stat("Live", -0.1, 1, None);
        live.current = true;
        let summary = analyzer.compute_summary(&[live]);
        assert_eq!(summary.avg_mdd, None);
        assert_eq!(summary.recovery_rate, None);
    }

    #[test]
    fn test_summary_no_recoveries() {
        let stats = vec![stat("A", -0.1, 4, None), stat("B", -0.2, 6, None)];
        let summary = ConflictWindowAnalyzer::default().compute_summary(&stats);

        assert_eq!(summary.avg_recovery_days, None);
        assert_eq!(summary.recovery_rate, Some(0.0));
    }

    #[test]
    fn test_current_snapshot() {
        let analyzer = ConflictWindowAnalyzer::default();
        let spx = RebasedWindow {
            event: "Live".into(),
            values: vec![1.0, 0.97, 0.95, 0.99],
        };
        let gold = RebasedWindow {
            event: "Live".into(),
            values: vec![1.0, 1.04],
        };
        let snapshot = analyzer.build_current_snapshot("Live", Some(&spx), Some(&gold), None);

        assert_eq!(snapshot.name, "Live");
        assert_eq!(snapshot.spx_days_elapsed, 3);
        assert_eq!(snapshot.spx_return, Some(-0.01));
        assert_eq!(snapshot.spx_low, Some(-0.05));
        assert_eq!(snapshot.gold_return, Some(0.04));
        assert_eq!(snapshot.oil_return, None);
    }

    #[test]
    fn test_current_snapshot_without_windows() {
        let snapshot = ConflictWindowAnalyzer::default().build_current_snapshot("Live", None, None, None);

        assert_eq!(snapshot.spx_days_elapsed, 0);
        assert_eq!(snapshot.spx_return, None);
        assert_eq!(snapshot.spx_low, None);
    }

    #[test]
    fn test_analyze_empty_asset_does_not_block_others() {
        let spx = prices("^GSPC", &[100.0, 90.0, 95.0, 101.0]);
        let gold = PriceSeries::new("GC=F", vec![]);
        let oil = make_series("CL=F", start(), &[None, None, None]);
        let events = single_event();

        let result = ConflictWindowAnalyzer::default().analyze(&spx, &gold, &oil, &events);

        assert_eq!(result.spx.stats.len(), 1);
        assert!(result.gold.rebased.is_empty() && result.gold.stats.is_empty());
        assert!(result.oil.rebased.is_empty() && result.oil.stats.is_empty());
        assert_eq!(result.summary.recovery_rate, Some(1.0));
        assert!(result.current.is_none());
    }

    #[test]
    fn test_analyze_current_event_snapshot_and_summary() {
        let first = start();
        let closes: Vec<f64> = vec![100.0, 90.0, 80.0, 85.0, 95.0, 101.0, 102.0, 97.0, 96.0];
        let spx = prices("^GSPC", &closes);
        let gold = prices("GC=F", &[50.0, 55.0, 60.0, 58.0, 57.0, 59.0, 61.0, 62.0, 66.0]);
        let oil = prices("CL=F", &[70.0, 77.0, 63.0, 70.0, 71.0, 72.0, 73.0, 74.0, 75.0]);
        let events = EventTable::new(vec![
            Event::new("Gulf War (1990)", first).with_note("n"),
            Event::new("Live", first + Duration::days(6)).as_current(),
        ])
        .unwrap();

        let result = ConflictWindowAnalyzer::default().analyze(&spx, &gold, &oil, &events);

        // Only the historical event contributes to the summary
        assert_eq!(result.summary.avg_mdd, Some(-0.2));
        assert_eq!(result.summary.recovery_rate, Some(1.0));

        let current = result.current.expect("live event snapshot");
        assert_eq!(current.name, "Live");
        assert_eq!(current.spx_days_elapsed, 2);
        assert_eq!(current.spx_return, Some(round_to(96.0 / 102.0 - 1.0, 4)));
        assert_eq!(current.spx_low, Some(round_to(96.0 / 102.0 - 1.0, 4)));
        assert_eq!(current.gold_return, Some(round_to(66.0 / 61.0 - 1.0, 4)));
        assert_eq!(current.oil_return, Some(round_to(75.0 / 73.0 - 1.0, 4)));
    }

    #[test]
    fn test_analysis_json_shape() {
        let spx = prices("^GSPC", &[100.0, 90.0, 80.0]);
        let events = EventTable::new(vec![
            Event::new("Gulf War (1990)", start()).with_note("n"),
            Event::new("Live", start() + Duration::days(1)).as_current(),
        ])
        .unwrap();

        let result = ConflictWindowAnalyzer::default().analyze(&spx, &spx, &spx, &events);
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["conflicts"]["Gulf War (1990)"]["start_date"], "1990-08-02");
        assert_eq!(json["conflicts"]["Gulf War (1990)"]["note"], "n");
        assert_eq!(json["spx"]["rebased"]["Gulf War (1990)"]["x"], serde_json::json!([0, 1, 2]));
        assert_eq!(json["spx"]["stats"][0]["conflict"], "Gulf War (1990)");
        assert!(json["spx"]["stats"][0]["recovery_days"].is_null());
        assert!(json["spx"]["stats"][0].get("current").is_none());
        assert_eq!(json["gold"]["stats"][0]["peak_gain"], 0.0);
        assert_eq!(json["current"]["name"], "Live");
        assert_eq!(json["summary"]["recovery_rate"], 0.0);
    }
}
