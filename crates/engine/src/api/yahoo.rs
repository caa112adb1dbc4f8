//! Yahoo Finance chart API client for daily closes (no authentication required)

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::{FetchError, PriceProvider};
use crate::types::{PricePoint, PriceSeries};

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

/// Yahoo Finance daily history client
#[derive(Clone)]
pub struct YahooClient {
    client: Client,
    base_url: String,
    history_start: NaiveDate,
}

// ---------------------------------------------------------------------------
// Deserialization structs
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<Quote>,
    adjclose: Option<Vec<AdjClose>>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl YahooClient {
    /// Create a client requesting history from `history_start` onwards
    pub fn new(history_start: NaiveDate) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, history_start)
    }

    pub fn with_base_url(base_url: impl Into<String>, history_start: NaiveDate) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into(),
            history_start,
        }
    }

    /// Fetch daily closes for `symbol` from the history start until now
    pub async fn get_daily_closes(&self, symbol: &str) -> Result<PriceSeries, FetchError> {
        let period1 = self
            .history_start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or(0);
        let period2 = Utc::now().timestamp();

        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);

        debug!(symbol, period1, period2, "Fetching daily chart from Yahoo");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("period1", period1.to_string()),
                ("period2", period2.to_string()),
                ("interval", "1d".to_string()),
                ("events", "div,split".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Yahoo reports unknown symbols as 404 with a chart.error payload
            if let Err(e @ FetchError::Provider { .. }) = parse_chart_response(symbol, &body) {
                return Err(e);
            }
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let series = parse_chart_response(symbol, &body)?;
        info!(
            symbol,
            points = series.len(),
            valid = series.valid_len(),
            "Fetched daily history"
        );
        Ok(series)
    }
}

#[async_trait]
impl PriceProvider for YahooClient {
    async fn fetch_series(&self, symbol: &str) -> Result<PriceSeries, FetchError> {
        self.get_daily_closes(symbol).await
    }
}

/// Parse a v8 chart payload into a daily series.
///
/// Adjusted closes are preferred; the raw close fills any gap. `null` entries
/// stay as missing observations. A well-formed payload without observations
/// yields an empty series rather than an error.
pub fn parse_chart_response(symbol: &str, body: &str) -> Result<PriceSeries, FetchError> {
    let response: ChartResponse =
        serde_json::from_str(body).map_err(|e| FetchError::Malformed(e.to_string()))?;

    if let Some(error) = response.chart.error {
        return Err(FetchError::Provider {
            code: error.code,
            description: error.description,
        });
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        warn!(symbol, "Chart payload has no result");
        return Ok(PriceSeries::new(symbol, Vec::new()));
    };

    let timestamps = result.timestamp.unwrap_or_default();
    if timestamps.is_empty() {
        warn!(symbol, "Chart payload has no observations");
        return Ok(PriceSeries::new(symbol, Vec::new()));
    }

    let closes = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close)
        .unwrap_or_default();
    let adjusted = result
        .indicators
        .adjclose
        .and_then(|a| a.into_iter().next())
        .map(|a| a.adjclose)
        .unwrap_or_default();

    if closes.is_empty() && adjusted.is_empty() {
        warn!(symbol, "Chart payload has no close prices");
    }

    let points = timestamps
        .iter()
        .enumerate()
        .map(|(i, &ts)| {
            let date = DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.date_naive())
                .ok_or_else(|| FetchError::Malformed(format!("invalid timestamp {ts}")))?;
            let close = adjusted
                .get(i)
                .copied()
                .flatten()
                .or_else(|| closes.get(i).copied().flatten());
            Ok(PricePoint::new(date, close))
        })
        .collect::<Result<Vec<_>, FetchError>>()?;

    Ok(PriceSeries::new(symbol, points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "^GSPC", "currency": "USD"},
                "timestamp": [649607400, 649693800, 649780200, 649866600],
                "indicators": {
                    "quote": [{"close": [355.5, null, 344.86, 351.48], "open": [1, 2, 3, 4]}],
                    "adjclose": [{"adjclose": [355.5, null, null, 351.48]}]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_sample_chart() {
        let series = parse_chart_response("^GSPC", SAMPLE).unwrap();

        assert_eq!(series.symbol, "^GSPC");
        assert_eq!(series.len(), 4);
        assert_eq!(
            series.points()[0].date,
            NaiveDate::from_ymd_opt(1990, 8, 2).unwrap()
        );
        assert_eq!(series.points()[0].close, Some(355.5));
        assert_eq!(series.points()[1].close, None);
        // adjclose gap is filled from the raw close
        assert_eq!(series.points()[2].close, Some(344.86));
        assert_eq!(series.valid_len(), 3);
    }

    #[test]
    fn test_parse_without_adjclose() {
        let body = r#"{"chart": {"result": [{
            "timestamp": [1700000000, 1700086400],
            "indicators": {"quote": [{"close": [80.1, 81.2]}]}
        }], "error": null}}"#;
        let series = parse_chart_response("CL=F", body).unwrap();
        assert_eq!(series.valid_len(), 2);
        assert_eq!(series.points()[1].close, Some(81.2));
    }

    #[test]
    fn test_parse_provider_error() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        match parse_chart_response("NOPE", body) {
            Err(FetchError::Provider { code, .. }) => assert_eq!(code, "Not Found"),
            other => panic!("expected provider error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_result_is_empty_series() {
        let body = r#"{"chart": {"result": [{"indicators": {"quote": [{}]}}], "error": null}}"#;
        let series = parse_chart_response("GC=F", body).unwrap();
        assert_eq!(series.symbol, "GC=F");
        assert!(series.is_empty());

        let body = r#"{"chart": {"result": [], "error": null}}"#;
        assert!(parse_chart_response("GC=F", body).unwrap().is_empty());
    }

    #[test]
    fn test_parse_without_closes_is_all_missing() {
        let body = r#"{"chart": {"result": [{
            "timestamp": [1700000000, 1700086400],
            "indicators": {"quote": [{}]}
        }], "error": null}}"#;
        let series = parse_chart_response("CL=F", body).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.valid_len(), 0);
    }

    #[test]
    fn test_parse_malformed_body() {
        assert!(matches!(
            parse_chart_response("GC=F", "<html>rate limited</html>"),
            Err(FetchError::Malformed(_))
        ));
    }
}
