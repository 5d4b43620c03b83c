pub mod ohlc;

pub use ohlc::{apply_trade, bucket_start, BucketUpdate, OhlcBucketer, DEFAULT_GRANULARITY_SECS};
