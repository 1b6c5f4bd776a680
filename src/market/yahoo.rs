//! Yahoo Finance chart client

use super::MarketDataSource;
use crate::config::MarketConfig;
use crate::error::AssistantError;
use crate::models::MarketSnapshot;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

pub struct YahooMarketData {
    client: Client,
    base_url: String,
    symbol: String,
}

impl YahooMarketData {
    pub fn new(config: &MarketConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(15))
            .user_agent("Mozilla/5.0 (compatible; budget-assistant)")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            symbol: config.symbol.to_uppercase(),
        })
    }
}

#[async_trait]
impl MarketDataSource for YahooMarketData {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn snapshot(&self) -> Result<MarketSnapshot> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, self.symbol);

        let response = self
            .client
            .get(&url)
            .query(&[("range", "7d"), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| {
                error!(symbol = %self.symbol, "Chart request failed: {}", e);
                AssistantError::MarketData(format!("Chart request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AssistantError::MarketData(format!(
                "Chart API returned {} for {}: {}",
                status, self.symbol, body
            )));
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| AssistantError::MarketData(format!("Invalid chart response: {}", e)))?;

        debug!(symbol = %self.symbol, "Chart received");
        snapshot_from_chart(&self.symbol, chart, Utc::now())
    }
}

/// Price from the quote meta (or last close); day change from the last two closes;
/// week change from the first close in the window to the last.
fn snapshot_from_chart(
    symbol: &str,
    chart: ChartResponse,
    fetched_at: DateTime<Utc>,
) -> Result<MarketSnapshot> {
    if let Some(err) = chart.chart.error {
        return Err(AssistantError::MarketData(format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = chart
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AssistantError::MarketData(format!("No chart data for {}", symbol)))?;

    let closes: Vec<f64> = result
        .indicators
        .quote
        .into_iter()
        .next()
        .map(|q| q.close.into_iter().flatten().collect())
        .unwrap_or_default();

    let price = result
        .meta
        .regular_market_price
        .or_else(|| closes.last().copied())
        .ok_or_else(|| AssistantError::MarketData(format!("No price for {}", symbol)))?;

    let day_change_percent = match closes.as_slice() {
        [.., prev, last] => percent_change(*prev, *last),
        _ => None,
    };

    let week_change_percent = match (closes.first(), closes.last()) {
        (Some(first), Some(last)) if closes.len() > 1 => percent_change(*first, *last),
        _ => None,
    };

    Ok(MarketSnapshot {
        name: result
            .meta
            .short_name
            .or(result.meta.long_name)
            .unwrap_or_else(|| symbol.to_string()),
        symbol: result.meta.symbol.unwrap_or_else(|| symbol.to_string()),
        price,
        currency: result.meta.currency.unwrap_or_else(|| "USD".to_string()),
        day_change_percent,
        week_change_percent,
        timestamp: fetched_at,
    })
}

fn percent_change(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 {
        return None;
    }
    Some((to - from) / from * 100.0)
}

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
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    currency: Option<String>,
    short_name: Option<String>,
    long_name: Option<String>,
    regular_market_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chart(closes: serde_json::Value, price: Option<f64>) -> ChartResponse {
        serde_json::from_value(json!({
            "chart": {
                "result": [{
                    "meta": {
                        "symbol": "AAPL",
                        "currency": "USD",
                        "shortName": "Apple Inc.",
                        "regularMarketPrice": price
                    },
                    "indicators": { "quote": [{ "close": closes }] }
                }],
                "error": null
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_snapshot_changes() {
        let now = Utc::now();
        let snapshot =
            snapshot_from_chart("AAPL", chart(json!([100.0, null, 105.0, 110.0]), Some(111.0)), now)
                .unwrap();

        assert_eq!(snapshot.name, "Apple Inc.");
        assert_eq!(snapshot.price, 111.0);
        assert_eq!(snapshot.timestamp, now);
        assert!((snapshot.week_change_percent.unwrap() - 10.0).abs() < 1e-9);
        let expected_day = (110.0 - 105.0) / 105.0 * 100.0;
        assert!((snapshot.day_change_percent.unwrap() - expected_day).abs() < 1e-9);
    }

    #[test]
    fn test_price_falls_back_to_last_close() {
        let snapshot =
            snapshot_from_chart("AAPL", chart(json!([190.5]), None), Utc::now()).unwrap();

        assert_eq!(snapshot.price, 190.5);
        assert!(snapshot.day_change_percent.is_none());
        assert!(snapshot.week_change_percent.is_none());
    }

    #[test]
    fn test_chart_error_is_reported() {
        let response: ChartResponse = serde_json::from_value(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }))
        .unwrap();

        let err = snapshot_from_chart("ZZZZ", response, Utc::now()).unwrap_err();
        assert!(err.to_string().contains("delisted"));
    }
}
