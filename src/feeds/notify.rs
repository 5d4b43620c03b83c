// =============================================================================
// User-facing notifications
// =============================================================================
//
// Notifications are plain records a renderer shows as toasts. Newest first;
// the renderer dismisses them by id. The formatters below turn feed failures
// into the wording users see.
// =============================================================================

use serde::Serialize;
use uuid::Uuid;

use super::catalog::SourceKind;
use super::StreamEvent;
use crate::error::FeedError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub id: Uuid,
    pub message: String,
}

impl Notification {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Notifications {
    messages: Vec<Notification>,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message at the front and return its id.
    pub fn push(&mut self, message: impl Into<String>) -> Uuid {
        let notification = Notification::new(message);
        let id = notification.id;
        self.messages.insert(0, notification);
        id
    }

    /// Returns false when no notification has `id`.
    pub fn dismiss(&mut self, id: Uuid) -> bool {
        let before = self.messages.len();
        self.messages.retain(|n| n.id != id);
        self.messages.len() != before
    }

    pub fn messages(&self) -> &[Notification] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Formatters
// ---------------------------------------------------------------------------

/// The API's own explanation from an error body, if the source has one.
pub fn historic_source_message(source: SourceKind, body: &serde_json::Value) -> Option<String> {
    let message = match source {
        SourceKind::Gdax => &body["message"],
        SourceKind::Quandl => &body["quandl_error"]["message"],
        SourceKind::Generated => return None,
    };
    message.as_str().filter(|m| !m.is_empty()).map(str::to_string)
}

/// `Error getting historic data: <status>[. <source message>]`
pub fn historic_error_message(source: SourceKind, err: &FeedError) -> String {
    let detail = err
        .body()
        .and_then(|body| historic_source_message(source, body))
        .map(|m| format!(". {m}"))
        .unwrap_or_default();
    format!("Error getting historic data: {}{}", err.status_text(), detail)
}

/// Wording for a stream error or close, or `None` when it is not worth showing.
pub fn stream_event_message(event: &StreamEvent) -> Option<String> {
    match event {
        StreamEvent::Error(message) if !message.is_empty() => Some(format!("Live stream error: {message}")),
        StreamEvent::Close { code, reason, clean } if !clean && *code != 1000 && *code != 1006 => {
            let reason = if reason.is_empty() { "Unkown reason." } else { reason.as_str() };
            Some(format!("Disconnected from live stream: {code} {reason}"))
        }
        _ => None,
    }
}

pub fn products_error_message(err: &FeedError) -> String {
    format!("Error retrieving GDAX products: {}", err.status_text())
}
