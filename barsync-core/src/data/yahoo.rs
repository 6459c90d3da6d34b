//! Yahoo Finance data provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API. One `fetch` is one
//! HTTP request; retry and backoff belong to the caller.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::provider::{DailyBar, DataProvider, ProviderError};
use chrono::{NaiveDate, NaiveTime};
use reqwest::Url;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: Url,
}

impl YahooProvider {
    pub fn new() -> Result<Self, ProviderError> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Point the provider at a different host (mirrors, local fixtures).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        let base_url = Url::parse(&base_url.into())
            .map_err(|e| ProviderError::message(format!("invalid base URL: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::message(format!("invalid base URL: {base_url}")));
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .map_err(|e| ProviderError::message(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
        })
    }

    /// Build the chart API URL for a symbol and date range. The symbol is
    /// percent-encoded as a single path segment.
    fn chart_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> Url {
        let start_ts = start.and_time(NaiveTime::MIN).and_utc().timestamp();
        // period2 is exclusive on Yahoo's side; push it to the end of `end`.
        let end_ts = end.and_time(NaiveTime::MIN).and_utc().timestamp() + 86_399;

        let mut url = self.base_url.clone();
        // Always Ok: cannot-be-a-base URLs are rejected in `with_base_url`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["v8", "finance", "chart", symbol]);
        }
        url.query_pairs_mut()
            .append_pair("period1", &start_ts.to_string())
            .append_pair("period2", &end_ts.to_string())
            .append_pair("interval", "1d")
            .append_pair("includeAdjustedClose", "true");
        url
    }

    /// Parse the chart API response into bars.
    ///
    /// A result without timestamps is a valid, empty range (not an error).
    fn parse_response(resp: ChartResponse) -> Result<Vec<DailyBar>, ProviderError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return Err(match resp.chart.error {
                    Some(err) if err.code == "Not Found" => {
                        ProviderError::http(404, format!("{}: {}", err.code, err.description))
                    }
                    Some(err) => ProviderError::message(format!("{}: {}", err.code, err.description)),
                    None => ProviderError::message("response format changed: empty result with no error"),
                });
            }
        };

        let Some(data) = result.into_iter().next() else {
            return Ok(Vec::new());
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(Vec::new());
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::message("response format changed: no quote data"))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        let mut bars = Vec::with_capacity(timestamps.len());

        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::message(format!("response format changed: invalid timestamp {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();
            let adj_close = adj_closes
                .as_ref()
                .and_then(|v| v.get(i).copied().flatten());

            // Skip bars where all OHLCV are None (holidays/non-trading days)
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            let close = close.unwrap_or(f64::NAN);
            bars.push(DailyBar {
                date,
                open: open.unwrap_or(f64::NAN),
                high: high.unwrap_or(f64::NAN),
                low: low.unwrap_or(f64::NAN),
                close,
                adj_close: adj_close.unwrap_or(close),
                volume: volume.unwrap_or(0),
            });
        }

        Ok(bars)
    }
}

impl DataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailyBar>, ProviderError> {
        let url = self.chart_url(symbol, start, end);

        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| ProviderError::message(format!("network error for {symbol}: {e}")))?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            // Yahoo answers unknown tickers with 404 and a chart error body.
            let body = resp.text().unwrap_or_default();
            return Err(ProviderError::http(404, not_found_detail(symbol, &body)));
        }
        if !status.is_success() {
            let reason = status.canonical_reason().unwrap_or("unexpected status");
            return Err(ProviderError::http(status.as_u16(), format!("{reason} for {symbol}")));
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            ProviderError::message(format!(
                "response format changed: failed to parse response for {symbol}: {e}"
            ))
        })?;

        Self::parse_response(chart)
    }
}

fn not_found_detail(symbol: &str, body: &str) -> String {
    serde_json::from_str::<ChartResponse>(body)
        .ok()
        .and_then(|r| r.chart.error)
        .map(|e| format!("{}: {}", e.code, e.description))
        .unwrap_or_else(|| format!("Not Found: {symbol}"))
}
