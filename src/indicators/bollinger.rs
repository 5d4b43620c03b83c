// =============================================================================
// Bollinger Bands
// =============================================================================
//
// A middle band (SMA over `period`), an upper band (SMA + k*σ) and a lower
// band (SMA - k*σ), where σ is the population standard deviation of the same
// window. Drawn as an overlay on the primary price pane.

use serde::Serialize;

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bands for the window ending at each index; `None` during warm-up.
pub fn bollinger_series(closes: &[f64], period: usize, num_std: f64) -> Vec<Option<BollingerPoint>> {
    if period == 0 {
        return vec![None; closes.len()];
    }

    let mut out = Vec::with_capacity(closes.len());
    for i in 0..closes.len() {
        if i + 1 < period {
            out.push(None);
            continue;
        }
        out.push(bands(&closes[i + 1 - period..=i], num_std));
    }
    out
}

fn bands(window: &[f64], num_std: f64) -> Option<BollingerPoint> {
    let n = window.len() as f64;
    let middle = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let point = BollingerPoint {
        upper: middle + num_std * std_dev,
        middle,
        lower: middle - num_std * std_dev,
    };
    (point.upper.is_finite() && point.lower.is_finite()).then_some(point)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bollinger_basic() {
        let closes: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let series = bollinger_series(&closes, 20, 2.0);
        assert!(series[18].is_none());
        let bb = series[19].unwrap();
        assert!((bb.middle - 10.5).abs() < 1e-10);
        assert!(bb.upper > bb.middle);
        assert!(bb.lower < bb.middle);
        assert!((bb.upper - bb.middle - (bb.middle - bb.lower)).abs() < 1e-10);
    }

    #[test]
    fn bollinger_insufficient_data() {
        let series = bollinger_series(&[1.0, 2.0, 3.0], 20, 2.0);
        assert!(series.iter().all(Option::is_none));
    }

    #[test]
    fn bollinger_flat() {
        let series = bollinger_series(&[100.0; 25], 20, 2.0);
        let bb = series[24].unwrap();
        assert!((bb.upper - bb.lower).abs() < 1e-10);
    }

    #[test]
    fn bollinger_rolls_window() {
        let mut closes = vec![10.0; 5];
        closes.push(40.0);
        let series = bollinger_series(&closes, 5, 2.0);
        assert!((series[4].unwrap().middle - 10.0).abs() < 1e-10);
        assert!((series[5].unwrap().middle - 16.0).abs() < 1e-10);
    }
}
