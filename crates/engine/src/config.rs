//! Runtime configuration for the analysis service
//!
//! Defaults can be overridden through `WARTIME_*` environment variables.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::warn;

use crate::analyzer::DEFAULT_WINDOW;
use crate::types::Asset;

const DEFAULT_CACHE_TTL_SECS: u64 = 300;

/// Provider symbols for the three tracked assets
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSymbols {
    pub spx: String,
    pub gold: String,
    pub oil: String,
}

impl AssetSymbols {
    pub fn get(&self, asset: Asset) -> &str {
        match asset {
            Asset::Spx => &self.spx,
            Asset::Gold => &self.gold,
            Asset::Oil => &self.oil,
        }
    }
}

impl Default for AssetSymbols {
    fn default() -> Self {
        Self {
            spx: Asset::Spx.default_symbol().to_string(),
            gold: Asset::Gold.default_symbol().to_string(),
            oil: Asset::Oil.default_symbol().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub symbols: AssetSymbols,
    /// Maximum observations per rebased window
    pub window: usize,
    /// How long fetched series are reused before refetching
    pub cache_ttl: Duration,
    /// Earliest date requested from the provider
    pub history_start: NaiveDate,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            symbols: AssetSymbols::default(),
            window: DEFAULT_WINDOW,
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            history_start: NaiveDate::from_ymd_opt(1950, 1, 1).unwrap_or_default(),
        }
    }
}

impl AnalyzerConfig {
    /// Defaults overlaid with `WARTIME_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(s) = lookup("WARTIME_SPX_SYMBOL") {
            config.symbols.spx = s;
        }
        if let Some(s) = lookup("WARTIME_GOLD_SYMBOL") {
            config.symbols.gold = s;
        }
        if let Some(s) = lookup("WARTIME_OIL_SYMBOL") {
            config.symbols.oil = s;
        }
        if let Some(window) = parse_var::<usize, _>(&lookup, "WARTIME_WINDOW") {
            if window >= 2 {
                config.window = window;
            } else {
                warn!(window, "WARTIME_WINDOW must be at least 2, keeping default");
            }
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WARTIME_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(date) = parse_var::<NaiveDate, _>(&lookup, "WARTIME_HISTORY_START") {
            config.history_start = date;
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Invalid value in environment, keeping default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AnalyzerConfig::from_lookup(|_| None);
        assert_eq!(config.window, 200);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.symbols.get(Asset::Spx), "^GSPC");
        assert_eq!(config.symbols.get(Asset::Gold), "GC=F");
        assert_eq!(config.symbols.get(Asset::Oil), "CL=F");
    }

    #[test]
    fn test_env_overrides() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("WARTIME_SPX_SYMBOL", "SPY"),
            ("WARTIME_WINDOW", "120"),
            ("WARTIME_CACHE_TTL_SECS", "60"),
            ("WARTIME_HISTORY_START", "1985-01-01"),
        ]));
        assert_eq!(config.symbols.spx, "SPY");
        assert_eq!(config.window, 120);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(
            config.history_start,
            NaiveDate::from_ymd_opt(1985, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = AnalyzerConfig::from_lookup(lookup_from(&[
            ("WARTIME_WINDOW", "1"),
            ("WARTIME_CACHE_TTL_SECS", "five minutes"),
            ("WARTIME_HISTORY_START", "yesterday"),
        ]));
        assert_eq!(config.window, 200);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(
            config.history_start,
            NaiveDate::from_ymd_opt(1950, 1, 1).unwrap()
        );
    }
}
