// =============================================================================
// Shared types used across the fluxchart core
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch (UTC).
pub type Timestamp = i64;

pub const MILLIS_PER_SECOND: i64 = 1_000;
pub const MILLIS_PER_MINUTE: i64 = 60 * MILLIS_PER_SECOND;
pub const MILLIS_PER_HOUR: i64 = 60 * MILLIS_PER_MINUTE;
pub const MILLIS_PER_DAY: i64 = 24 * MILLIS_PER_HOUR;
pub const MILLIS_PER_WEEK: i64 = 7 * MILLIS_PER_DAY;

/// One OHLCV bucket of the price series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: Timestamp,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl SeriesPoint {
    pub fn new(date: Timestamp, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// A bucket whose four prices are all `price` (the first trade of a bucket).
    pub fn flat(date: Timestamp, price: f64, volume: f64) -> Self {
        Self::new(date, price, price, price, price, volume)
    }
}

/// A single executed trade from a streaming feed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub time: Timestamp,
    pub price: f64,
    pub size: f64,
}

/// An ordered `[start, end]` date range: a view domain or a data extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl DateRange {
    /// Build a range from two dates in either order.
    pub fn new(a: Timestamp, b: Timestamp) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    pub fn min(&self) -> Timestamp {
        self.start.min(self.end)
    }

    pub fn max(&self) -> Timestamp {
        self.start.max(self.end)
    }

    /// The same range with `start <= end`.
    pub fn sorted(&self) -> Self {
        Self::new(self.start, self.end)
    }

    /// Raw (wall-clock) width in milliseconds, ignoring discontinuities.
    pub fn width(&self) -> i64 {
        self.max() - self.min()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, date: Timestamp) -> bool {
        date >= self.min() && date <= self.max()
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", format_timestamp(self.start), format_timestamp(self.end))
    }
}

/// RFC 3339 rendering of a timestamp, falling back to the raw number when it
/// is outside chrono's representable range.
pub fn format_timestamp(ts: Timestamp) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| ts.to_string())
}

/// Price fields a series point exposes to extent calculations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume,
}

impl PriceField {
    pub fn of(&self, point: &SeriesPoint) -> f64 {
        match self {
            Self::Open => point.open,
            Self::High => point.high,
            Self::Low => point.low,
            Self::Close => point.close,
            Self::Volume => point.volume,
        }
    }
}

/// How the primary series is drawn. Decides which fields drive the y extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesStyle {
    #[default]
    Candlestick,
    Ohlc,
    Line,
    Point,
    Area,
}

impl SeriesStyle {
    pub fn extent_fields(&self) -> &'static [PriceField] {
        match self {
            Self::Candlestick | Self::Ohlc => &[PriceField::High, PriceField::Low],
            Self::Line | Self::Point | Self::Area => &[PriceField::Close],
        }
    }
}
