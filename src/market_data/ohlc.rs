// =============================================================================
// OHLC Bucketer: folds streamed trades into the sorted candle series
// =============================================================================
//
// Trades are floored to the bucket start for the current granularity and
// either merged into the bucket already holding that start or inserted as a
// new bucket at its sorted position. Arrival order does not matter.
// =============================================================================

use tracing::debug;

use crate::types::{SeriesPoint, Trade, MILLIS_PER_SECOND};

pub const DEFAULT_GRANULARITY_SECS: u32 = 60;

/// Whether a trade opened a new bucket or updated an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketUpdate {
    Created { index: usize },
    Merged { index: usize },
}

impl BucketUpdate {
    pub fn index(&self) -> usize {
        match self {
            Self::Created { index } | Self::Merged { index } => *index,
        }
    }
}

/// Start of the bucket containing `time` (ms), flooring toward negative
/// infinity.
pub fn bucket_start(time: i64, granularity_secs: u32) -> i64 {
    let width = granularity_secs.max(1) as i64 * MILLIS_PER_SECOND;
    time.div_euclid(width) * width
}

/// Merge `trade` into `buckets`, keeping them sorted ascending by date.
pub fn apply_trade(buckets: &mut Vec<SeriesPoint>, trade: &Trade, granularity_secs: u32) -> BucketUpdate {
    let start = bucket_start(trade.time, granularity_secs);
    let index = buckets.partition_point(|b| b.date < start);

    match buckets.get_mut(index) {
        Some(bucket) if bucket.date == start => {
            bucket.high = bucket.high.max(trade.price);
            bucket.low = bucket.low.min(trade.price);
            bucket.close = trade.price;
            bucket.volume += trade.size;
            BucketUpdate::Merged { index }
        }
        _ => {
            buckets.insert(index, SeriesPoint::flat(start, trade.price, trade.size));
            BucketUpdate::Created { index }
        }
    }
}

/// Owns the bucket granularity used for live trades.
///
/// Changing the granularity only affects trades applied afterwards; buckets
/// already in the series are left as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OhlcBucketer {
    granularity_secs: u32,
}

impl Default for OhlcBucketer {
    fn default() -> Self {
        Self::new(DEFAULT_GRANULARITY_SECS)
    }
}

impl OhlcBucketer {
    pub fn new(granularity_secs: u32) -> Self {
        Self {
            granularity_secs: granularity_secs.max(1),
        }
    }

    pub fn granularity(&self) -> u32 {
        self.granularity_secs
    }

    pub fn set_granularity(&mut self, granularity_secs: u32) {
        self.granularity_secs = granularity_secs.max(1);
    }

    pub fn apply(&self, buckets: &mut Vec<SeriesPoint>, trade: &Trade) -> BucketUpdate {
        let update = apply_trade(buckets, trade, self.granularity_secs);
        debug!(
            time = trade.time,
            price = trade.price,
            granularity = self.granularity_secs,
            ?update,
            "trade bucketed"
        );
        update
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
