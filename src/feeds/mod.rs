// =============================================================================
// Data Feeds Module
// =============================================================================
//
// Historic feeds answer one candle request at a time. Streaming feeds push
// trades for a single product over a long-lived connection. Every message a
// feed produces is tagged with the session generation it was requested for
// so the driver can drop results that arrive after the selection changed.
// =============================================================================

pub mod catalog;
pub mod gdax;
pub mod gdax_stream;
pub mod generator;
pub mod notify;
pub mod pacer;
pub mod quandl;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::FeedError;
use crate::types::{SeriesPoint, Timestamp, Trade, MILLIS_PER_SECOND};

pub use catalog::{Catalog, Period, Product, SourceKind, GENERATOR_PRODUCT};
pub use gdax::GdaxClient;
pub use gdax_stream::{GdaxStream, StreamHandle};
pub use generator::DataGenerator;
pub use notify::{Notification, Notifications};
pub use pacer::RequestPacer;
pub use quandl::QuandlClient;

/// One historic candle request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoricRequest {
    pub end: Timestamp,
    /// Candle width in seconds.
    pub granularity: u32,
    pub candles: u32,
    pub product: Option<String>,
}

impl HistoricRequest {
    /// `end` less `candles` candle widths.
    pub fn start(&self) -> Timestamp {
        self.end - i64::from(self.candles) * i64::from(self.granularity) * MILLIS_PER_SECOND
    }
}

#[async_trait]
pub trait HistoricFeed: Send + Sync {
    /// Candles covering the request, sorted ascending by date.
    async fn fetch(&self, request: &HistoricRequest) -> Result<Vec<SeriesPoint>, FeedError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Open,
    Trade(Trade),
    Error(String),
    Close { code: u16, reason: String, clean: bool },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StreamMessage {
    pub generation: u64,
    pub event: StreamEvent,
}

pub trait StreamingFeed: Send + Sync {
    /// Start streaming trades for `product`. Events go to `events` tagged with
    /// `generation` until the returned handle is closed or dropped.
    fn connect(
        &self,
        product: &str,
        generation: u64,
        events: mpsc::UnboundedSender<StreamMessage>,
    ) -> StreamHandle;
}

/// Turn a non-success response into `FeedError::Http`, keeping any JSON body.
pub(crate) async fn http_error(resp: reqwest::Response) -> FeedError {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .ok()
        .and_then(|text| serde_json::from_str::<serde_json::Value>(&text).ok());
    FeedError::Http {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        body,
    }
}

/// The feeds available to a session, keyed by source kind.
#[derive(Clone, Default)]
pub struct Feeds {
    historic: HashMap<SourceKind, Arc<dyn HistoricFeed>>,
    streaming: HashMap<SourceKind, Arc<dyn StreamingFeed>>,
}

impl Feeds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_historic(mut self, kind: SourceKind, feed: Arc<dyn HistoricFeed>) -> Self {
        self.historic.insert(kind, feed);
        self
    }

    pub fn with_streaming(mut self, kind: SourceKind, feed: Arc<dyn StreamingFeed>) -> Self {
        self.streaming.insert(kind, feed);
        self
    }

    pub fn historic(&self, kind: SourceKind) -> Option<Arc<dyn HistoricFeed>> {
        self.historic.get(&kind).cloned()
    }

    pub fn streaming(&self, kind: SourceKind) -> Option<Arc<dyn StreamingFeed>> {
        self.streaming.get(&kind).cloned()
    }
}

impl std::fmt::Debug for Feeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feeds")
            .field("historic", &self.historic.keys().collect::<Vec<_>>())
            .field("streaming", &self.streaming.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_start_spans_all_candles() {
        let req = HistoricRequest {
            end: 10_000_000,
            granularity: 60,
            candles: 100,
            product: None,
        };
        assert_eq!(req.start(), 10_000_000 - 6_000_000);
    }

    #[test]
    fn feeds_lookup_by_kind() {
        let feeds = Feeds::new().with_historic(SourceKind::Generated, Arc::new(DataGenerator::new(Some(1))));
        assert!(feeds.historic(SourceKind::Generated).is_some());
        assert!(feeds.historic(SourceKind::Quandl).is_none());
        assert!(feeds.streaming(SourceKind::Gdax).is_none());
    }

    #[test]
    fn stream_events_serialise_with_type_tag() {
        let json = serde_json::to_value(StreamEvent::Close {
            code: 1001,
            reason: "going away".into(),
            clean: false,
        })
        .unwrap();
        assert_eq!(json["type"], "close");
        assert_eq!(json["code"], 1001);
    }
}
