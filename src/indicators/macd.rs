// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   macd       = EMA_fast(close) - EMA_slow(close)
//   signal     = EMA_signal(macd)
//   divergence = macd - signal
//
// The pane's y domain is symmetrical about zero.
// =============================================================================

use serde::Serialize;

use super::ema::{ema_of_optional, ema_series};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: Option<f64>,
    pub divergence: Option<f64>,
}

pub fn macd_series(closes: &[f64], fast: usize, slow: usize, signal: usize) -> Vec<Option<MacdPoint>> {
    let fast_ema = ema_series(closes, fast);
    let slow_ema = ema_series(closes, slow);

    let macd: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();
    let signal_line = ema_of_optional(&macd, signal);

    macd.iter()
        .zip(&signal_line)
        .map(|(m, s)| {
            let macd = (*m)?;
            Some(MacdPoint {
                macd,
                signal: *s,
                divergence: s.map(|s| macd - s),
            })
        })
        .collect()
}
