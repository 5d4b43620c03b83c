// =============================================================================
// Quandl REST client: WIKI end-of-day stock prices
// =============================================================================
//
// Only daily and weekly collapses are requested. The adjusted columns
// ("Adj. Open" ...) become the OHLCV fields; the raw columns are kept under
// an `unadjusted` prefix and ignored by the chart. Dates are calendar days
// and land on midnight UTC.
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, instrument, warn};

use super::{http_error, HistoricFeed, HistoricRequest};
use crate::error::FeedError;
use crate::types::{SeriesPoint, Timestamp};

pub const DEFAULT_URL: &str = "https://www.quandl.com/api/v3";
pub const DATABASE: &str = "WIKI";

/// The `collapse` parameter for a granularity in seconds.
pub fn collapse_for(granularity: u32) -> Option<&'static str> {
    match granularity {
        86_400 => Some("daily"),
        604_800 => Some("weekly"),
        _ => None,
    }
}

/// WIKI column name to series field name.
pub fn map_column_name(name: &str) -> String {
    match name {
        "Open" => "unadjustedOpen".into(),
        "High" => "unadjustedHigh".into(),
        "Low" => "unadjustedLow".into(),
        "Close" => "unadjustedClose".into(),
        "Volume" => "unadjustedVolume".into(),
        "Adj. Open" => "open".into(),
        "Adj. High" => "high".into(),
        "Adj. Low" => "low".into(),
        "Adj. Close" => "close".into(),
        "Adj. Volume" => "volume".into(),
        other => {
            let mut chars = other.chars();
            match chars.next() {
                Some(first) => first.to_lowercase().chain(chars).collect(),
                None => String::new(),
            }
        }
    }
}

#[derive(Clone)]
pub struct QuandlClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl QuandlClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build Quandl HTTP client")?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    fn dataset_url(&self, dataset: &str, start: Timestamp, end: Timestamp, collapse: &str) -> String {
        let mut params = Vec::new();
        if let Some(key) = &self.api_key {
            params.push(format!("api_key={key}"));
        }
        params.push(format!("start_date={}", iso_day(start)));
        params.push(format!("end_date={}", iso_day(end)));
        params.push("order=asc".to_string());
        params.push(format!("collapse={collapse}"));
        format!(
            "{}/datasets/{}/{}/data.json?{}",
            self.base_url,
            DATABASE,
            dataset,
            params.join("&")
        )
    }

    /// GET /datasets/WIKI/{dataset}/data.json
    #[instrument(skip(self), name = "quandl::get_dataset")]
    pub async fn get_dataset(
        &self,
        dataset: &str,
        start: Timestamp,
        end: Timestamp,
        granularity: u32,
    ) -> Result<Vec<SeriesPoint>, FeedError> {
        let collapse = collapse_for(granularity).ok_or(FeedError::UnsupportedGranularity(granularity))?;
        let url = self.dataset_url(dataset, start, end, collapse);

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let err = http_error(resp).await;
            warn!(dataset, error = %err, "Quandl dataset request failed");
            return Err(err);
        }

        let body: serde_json::Value = resp.json().await?;
        let points = parse_dataset(&body)?;
        debug!(dataset, collapse, count = points.len(), "Quandl dataset fetched");
        Ok(points)
    }
}

impl std::fmt::Debug for QuandlClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuandlClient")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl HistoricFeed for QuandlClient {
    async fn fetch(&self, request: &HistoricRequest) -> Result<Vec<SeriesPoint>, FeedError> {
        let dataset = request
            .product
            .as_deref()
            .ok_or_else(|| FeedError::UnsupportedProduct("a Quandl dataset code is required".into()))?;
        self.get_dataset(dataset, request.start(), request.end, request.granularity)
            .await
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn iso_day(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

fn parse_day(value: &serde_json::Value) -> Option<Timestamp> {
    let text = value.as_str()?;
    let day = text.get(..10).unwrap_or(text);
    let date = NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// Parse a `dataset_data` payload. The first column is the date.
pub fn parse_dataset(body: &serde_json::Value) -> Result<Vec<SeriesPoint>, FeedError> {
    let dataset = &body["dataset_data"];
    let columns: Vec<String> = dataset["column_names"]
        .as_array()
        .ok_or_else(|| FeedError::Parse("dataset_data.column_names missing".into()))?
        .iter()
        .map(|c| map_column_name(c.as_str().unwrap_or_default()))
        .collect();
    let rows = dataset["data"]
        .as_array()
        .ok_or_else(|| FeedError::Parse("dataset_data.data missing".into()))?;

    let index_of = |field: &str| {
        columns
            .iter()
            .position(|c| c == field)
            .ok_or_else(|| FeedError::Parse(format!("dataset has no {field} column")))
    };
    let fields = [
        index_of("open")?,
        index_of("high")?,
        index_of("low")?,
        index_of("close")?,
        index_of("volume")?,
    ];

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let date = parse_day(&row[0]);
        let values: Option<Vec<f64>> = fields.iter().map(|&i| row[i].as_f64()).collect();
        match (date, values.as_deref()) {
            (Some(date), Some(&[open, high, low, close, volume])) => {
                points.push(SeriesPoint::new(date, open, high, low, close, volume));
            }
            _ => warn!(row = %row, "skipping incomplete Quandl row"),
        }
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> serde_json::Value {
        json!({
            "dataset_data": {
                "column_names": ["Date", "Open", "High", "Low", "Close", "Volume", "Ex-Dividend",
                    "Split Ratio", "Adj. Open", "Adj. High", "Adj. Low", "Adj. Close", "Adj. Volume"],
                "data": [
                    ["2016-01-05", 746.45, 752.0, 738.64, 742.58, 1950691.0, 0.0, 1.0,
                        746.45, 752.0, 738.64, 742.58, 1950691.0],
                    ["2016-01-04", 743.0, 744.06, 731.26, 741.84, 3272844.0, 0.0, 1.0,
                        371.5, 372.03, 365.63, 370.92, 6545688.0]
                ]
            }
        })
    }

    #[test]
    fn column_names_map_to_adjusted_fields() {
        assert_eq!(map_column_name("Adj. Close"), "close");
        assert_eq!(map_column_name("Close"), "unadjustedClose");
        assert_eq!(map_column_name("Ex-Dividend"), "ex-Dividend");
        assert_eq!(map_column_name("Date"), "date");
        assert_eq!(map_column_name(""), "");
    }

    #[test]
    fn dataset_uses_adjusted_values_at_midnight() {
        let points = parse_dataset(&payload()).unwrap();
        assert_eq!(points.len(), 2);
        // 2016-01-04T00:00:00Z
        assert_eq!(points[0].date, 1_451_865_600_000);
        assert!((points[0].open - 371.5).abs() < 1e-9);
        assert!((points[0].volume - 6_545_688.0).abs() < 1e-6);
        assert_eq!(points[1].date - points[0].date, 86_400_000);
    }

    #[test]
    fn rows_with_nulls_are_skipped() {
        let mut body = payload();
        body["dataset_data"]["data"][0][11] = serde_json::Value::Null;
        assert_eq!(parse_dataset(&body).unwrap().len(), 1);
    }

    #[test]
    fn missing_columns_are_parse_errors() {
        let err = parse_dataset(&json!({"quandl_error": {"code": "QECx02", "message": "bad key"}})).unwrap_err();
        assert!(matches!(err, FeedError::Parse(_)));
    }

    #[test]
    fn collapse_only_daily_and_weekly() {
        assert_eq!(collapse_for(86_400), Some("daily"));
        assert_eq!(collapse_for(604_800), Some("weekly"));
        assert_eq!(collapse_for(3600), None);
    }

    #[test]
    fn url_carries_dates_and_key() {
        let client = QuandlClient::new("https://example.test/api/v3/", Some("k".into())).unwrap();
        let url = client.dataset_url("GOOG", 1_451_865_600_000, 1_452_038_400_000, "daily");
        assert_eq!(
            url,
            "https://example.test/api/v3/datasets/WIKI/GOOG/data.json?api_key=k&start_date=2016-01-04\
             &end_date=2016-01-06&order=asc&collapse=daily"
        );
    }

    #[tokio::test]
    async fn unsupported_granularity_fails_before_request() {
        let client = QuandlClient::new(DEFAULT_URL, None).unwrap();
        let req = HistoricRequest {
            end: 0,
            granularity: 60,
            candles: 10,
            product: Some("GOOG".into()),
        };
        let err = client.fetch(&req).await.unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedGranularity(60)));
    }
}
