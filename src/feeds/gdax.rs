// =============================================================================
// GDAX REST client: public candle and product endpoints
// =============================================================================
//
// Candle rows arrive newest first as `[time, low, high, open, close, volume]`
// with `time` in seconds. Calls are spaced by a shared `RequestPacer` since
// the public API throttles per IP.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{debug, instrument, warn};

use super::catalog::{default_periods, Product, SourceKind};
use super::{http_error, HistoricFeed, HistoricRequest, RequestPacer};
use crate::error::FeedError;
use crate::types::{SeriesPoint, Timestamp, MILLIS_PER_SECOND};

pub const DEFAULT_REST_URL: &str = "https://api.gdax.com";

#[derive(Clone)]
pub struct GdaxClient {
    base_url: String,
    client: reqwest::Client,
    pacer: Arc<RequestPacer>,
}

impl GdaxClient {
    // -------------------------------------------------------------------------
    // Construction
    // -------------------------------------------------------------------------

    pub fn new(base_url: impl Into<String>, request_interval: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fluxchart/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .build()
            .context("failed to build GDAX HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(base_url = %base_url, "GdaxClient initialised");
        Ok(Self {
            base_url,
            client,
            pacer: Arc::new(RequestPacer::new(request_interval)),
        })
    }

    pub fn pacer(&self) -> &RequestPacer {
        &self.pacer
    }

    // -------------------------------------------------------------------------
    // Endpoints
    // -------------------------------------------------------------------------

    /// GET /products/{id}/candles
    #[instrument(skip(self), name = "gdax::get_candles")]
    pub async fn get_candles(
        &self,
        product: &str,
        start: Timestamp,
        end: Timestamp,
        granularity: u32,
    ) -> Result<Vec<SeriesPoint>, FeedError> {
        let url = format!(
            "{}/products/{}/candles?start={}&end={}&granularity={}",
            self.base_url,
            product,
            iso_date(start),
            iso_date(end),
            granularity
        );

        self.pacer.acquire().await;
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            let err = http_error(resp).await;
            warn!(product, error = %err, "GDAX candles request failed");
            return Err(err);
        }

        let body: serde_json::Value = resp.json().await?;
        let candles = parse_candles(&body)?;
        debug!(product, granularity, count = candles.len(), "candles fetched");
        Ok(candles)
    }

    /// GET /products, turned into catalog entries offering every period.
    #[instrument(skip(self), name = "gdax::get_products")]
    pub async fn get_products(&self) -> Result<Vec<Product>, FeedError> {
        let url = format!("{}/products", self.base_url);

        self.pacer.acquire().await;
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(http_error(resp).await);
        }

        let body: serde_json::Value = resp.json().await?;
        let products = parse_products(&body)?;
        debug!(count = products.len(), "GDAX products fetched");
        Ok(products)
    }
}

impl std::fmt::Debug for GdaxClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GdaxClient")
            .field("base_url", &self.base_url)
            .field("pacer", &self.pacer)
            .finish()
    }
}

#[async_trait]
impl HistoricFeed for GdaxClient {
    async fn fetch(&self, request: &HistoricRequest) -> Result<Vec<SeriesPoint>, FeedError> {
        let product = request
            .product
            .as_deref()
            .ok_or_else(|| FeedError::UnsupportedProduct("a GDAX product id is required".into()))?;
        self.get_candles(product, request.start(), request.end, request.granularity)
            .await
    }
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn iso_date(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Parse a candles payload into ascending series points.
pub fn parse_candles(body: &serde_json::Value) -> Result<Vec<SeriesPoint>, FeedError> {
    let rows = body
        .as_array()
        .ok_or_else(|| FeedError::Parse("candles response is not an array".into()))?;

    let mut points = Vec::with_capacity(rows.len());
    for row in rows {
        let fields: Option<Vec<f64>> = row
            .as_array()
            .filter(|r| r.len() >= 6)
            .map(|r| r.iter().take(6).filter_map(|v| v.as_f64()).collect());
        match fields.as_deref() {
            Some(&[time, low, high, open, close, volume]) => {
                let date = (time * MILLIS_PER_SECOND as f64).round() as i64;
                points.push(SeriesPoint::new(date, open, high, low, close, volume));
            }
            _ => warn!(row = %row, "skipping malformed candle row"),
        }
    }
    points.sort_by_key(|p| p.date);
    Ok(points)
}

/// Parse the product list into catalog entries.
pub fn parse_products(body: &serde_json::Value) -> Result<Vec<Product>, FeedError> {
    let entries = body
        .as_array()
        .ok_or_else(|| FeedError::Parse("products response is not an array".into()))?;
    Ok(entries
        .iter()
        .filter_map(|entry| entry["id"].as_str())
        .map(|id| Product::new(id, SourceKind::Gdax, default_periods()))
        .collect())
}
