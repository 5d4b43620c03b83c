// =============================================================================
// GDAX trade stream: WebSocket `match` feed for one product
// =============================================================================
//
// Each connection subscribes to a single product and forwards `match`
// messages as trades and `error` messages as stream errors. Open and Close
// events bracket the connection. Closing the handle sends a normal close
// frame and ends the task without emitting a Close event.
// =============================================================================

use anyhow::{Context, Result};
use chrono::DateTime;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::{StreamEvent, StreamMessage, StreamingFeed};
use crate::error::FeedError;
use crate::types::Trade;

pub const DEFAULT_WS_URL: &str = "wss://ws-feed.gdax.com";
pub const DEFAULT_PRODUCT: &str = "BTC-USD";

/// Close code reported when the connection drops without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;
/// Close code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

#[derive(Debug, Clone)]
pub struct GdaxStream {
    url: String,
}

impl GdaxStream {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for GdaxStream {
    fn default() -> Self {
        Self::new(DEFAULT_WS_URL)
    }
}

impl StreamingFeed for GdaxStream {
    fn connect(
        &self,
        product: &str,
        generation: u64,
        events: mpsc::UnboundedSender<StreamMessage>,
    ) -> StreamHandle {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let url = self.url.clone();
        let product = if product.is_empty() {
            DEFAULT_PRODUCT.to_string()
        } else {
            product.to_string()
        };
        let task = tokio::spawn(async move {
            let emit = |event: StreamEvent| {
                let _ = events.send(StreamMessage { generation, event });
            };
            if let Err(e) = run_trade_stream(&url, &product, &emit, shutdown_rx).await {
                warn!(product = %product, error = %e, "trade WebSocket failed");
                emit(StreamEvent::Close {
                    code: ABNORMAL_CLOSURE,
                    reason: String::new(),
                    clean: false,
                });
            }
        });
        StreamHandle::new(shutdown_tx, task)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Owner of a running stream. Closing is idempotent and dropping closes.
#[derive(Debug)]
pub struct StreamHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl StreamHandle {
    pub fn new(shutdown: oneshot::Sender<()>, task: JoinHandle<()>) -> Self {
        Self {
            shutdown: Some(shutdown),
            task,
        }
    }

    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none() || self.task.is_finished()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Connection loop
// ---------------------------------------------------------------------------

async fn run_trade_stream(
    url: &str,
    product: &str,
    emit: &impl Fn(StreamEvent),
    mut shutdown: oneshot::Receiver<()>,
) -> Result<()> {
    info!(url = %url, product = %product, "connecting to trade WebSocket");

    let (ws_stream, _response) = connect_async(url)
        .await
        .context("failed to connect to trade WebSocket")?;
    let (mut write, mut read) = ws_stream.split();

    write
        .send(Message::Text(subscribe_message(product)))
        .await
        .context("failed to send subscribe message")?;
    info!(product = %product, "trade WebSocket subscribed");
    emit(StreamEvent::Open);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                let frame = CloseFrame { code: CloseCode::Normal, reason: "".into() };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    debug!(error = %e, "close frame not delivered");
                }
                info!(product = %product, "trade WebSocket closed");
                return Ok(());
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_message(&text) {
                    Ok(Some(event)) => emit(event),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "failed to parse GDAX feed message"),
                },
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.to_string()))
                        .unwrap_or((NO_STATUS_RECEIVED, String::new()));
                    info!(product = %product, code, reason = %reason, "trade WebSocket closed by server");
                    emit(StreamEvent::Close { code, reason, clean: true });
                    return Ok(());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(product = %product, error = %e, "trade WebSocket read error");
                    emit(StreamEvent::Close { code: ABNORMAL_CLOSURE, reason: e.to_string(), clean: false });
                    return Ok(());
                }
                None => {
                    warn!(product = %product, "trade WebSocket stream ended");
                    emit(StreamEvent::Close { code: ABNORMAL_CLOSURE, reason: String::new(), clean: false });
                    return Ok(());
                }
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

pub fn subscribe_message(product: &str) -> String {
    serde_json::json!({ "type": "subscribe", "product_id": product }).to_string()
}

/// Parse one feed message. Types other than `match` and `error` yield `None`.
///
/// ```json
/// { "type": "match", "time": "2014-11-07T08:19:27.028459Z", "price": "400.23", "size": "5.23512" }
/// ```
pub fn parse_message(text: &str) -> Result<Option<StreamEvent>, FeedError> {
    let root: serde_json::Value =
        serde_json::from_str(text).map_err(|e| FeedError::Parse(e.to_string()))?;

    match root["type"].as_str() {
        Some("match") => {
            let time = root["time"]
                .as_str()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                .ok_or_else(|| FeedError::Parse("match without a valid time".into()))?
                .timestamp_millis();
            let price = number_field(&root, "price")?;
            let size = number_field(&root, "size")?;
            Ok(Some(StreamEvent::Trade(Trade { time, price, size })))
        }
        Some("error") => {
            let message = root["message"].as_str().unwrap_or_default().to_string();
            Ok(Some(StreamEvent::Error(message)))
        }
        _ => Ok(None),
    }
}

/// GDAX sends decimals as strings. Plain numbers are accepted too.
fn number_field(root: &serde_json::Value, name: &str) -> Result<f64, FeedError> {
    let value = &root[name];
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_f64())
        .ok_or_else(|| FeedError::Parse(format!("missing or invalid field {name}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_becomes_trade() {
        let text = r#"{"type":"match","trade_id":10,"time":"2014-11-07T08:19:27.028Z",
            "product_id":"BTC-USD","size":"5.23512","price":"400.23","side":"sell"}"#;
        match parse_message(text).unwrap() {
            Some(StreamEvent::Trade(t)) => {
                assert_eq!(t.time, 1_415_348_367_028);
                assert!((t.price - 400.23).abs() < 1e-9);
                assert!((t.size - 5.23512).abs() < 1e-9);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_message_is_forwarded() {
        let event = parse_message(r#"{"type":"error","message":"Failed to subscribe"}"#).unwrap();
        assert_eq!(event, Some(StreamEvent::Error("Failed to subscribe".into())));
    }

    #[test]
    fn other_types_are_ignored() {
        assert_eq!(parse_message(r#"{"type":"heartbeat","sequence":1}"#).unwrap(), None);
        assert_eq!(parse_message(r#"{"type":"received"}"#).unwrap(), None);
    }

    #[test]
    fn bad_match_is_a_parse_error() {
        assert!(parse_message(r#"{"type":"match","time":"yesterday","price":"1","size":"1"}"#).is_err());
        assert!(parse_message(r#"{"type":"match","time":"2014-11-07T08:19:27Z","size":"1"}"#).is_err());
        assert!(parse_message("not json").is_err());
    }

    #[test]
    fn subscribe_names_product() {
        let msg: serde_json::Value = serde_json::from_str(&subscribe_message("ETH-USD")).unwrap();
        assert_eq!(msg["type"], "subscribe");
        assert_eq!(msg["product_id"], "ETH-USD");
    }

    #[tokio::test]
    async fn handle_close_is_idempotent() {
        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _ = rx.await;
        });
        let mut handle = StreamHandle::new(tx, task);
        assert!(!handle.is_closed());
        handle.close();
        handle.close();
        assert!(handle.is_closed());
    }
}
