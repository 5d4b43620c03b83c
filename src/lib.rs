//! Interactive financial time-series chart core: OHLC bucketing, pan/zoom
//! view domains, time-axis ticks, indicators, pluggable historic and live
//! feeds, and a small HTTP/WebSocket API that publishes render snapshots.

pub mod api;
pub mod app_state;
pub mod driver;
pub mod error;
pub mod events;
pub mod feeds;
pub mod indicators;
pub mod market_data;
pub mod runtime_config;
pub mod schedule;
pub mod session;
pub mod types;
pub mod view;
