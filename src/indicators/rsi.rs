// =============================================================================
// Relative Strength Index (RSI): Wilder's smoothing
// =============================================================================
//
// Step 1: price changes (deltas) from consecutive closes.
// Step 2: seed average gain / loss with the SMA of the first `period` deltas.
// Step 3: Wilder's smoothing:
//           avg_gain = (prev_avg_gain * (period - 1) + gain) / period
//           avg_loss = (prev_avg_loss * (period - 1) + loss) / period
// Step 4: RS = avg_gain / avg_loss, RSI = 100 - 100 / (1 + RS)
// =============================================================================

pub const DEFAULT_PERIOD: usize = 14;
pub const OVERBOUGHT: f64 = 70.0;
pub const OVERSOLD: f64 = 30.0;

/// Fixed y domain of the RSI pane.
pub const DOMAIN: (f64, f64) = (0.0, 100.0);
/// Reference lines drawn across the RSI pane.
pub const TICK_VALUES: [f64; 3] = [OVERSOLD, 50.0, OVERBOUGHT];

/// RSI aligned by index with `closes`; the first value is at index `period`.
///
/// # Edge cases
/// - `period == 0` or fewer than `period + 1` closes => all `None`
/// - No down moves => 100, no movement at all => 50
/// - A non-finite value ends the series.
pub fn rsi_series(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() < period + 1 {
        return out;
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        if d > 0.0 {
            (g + d, l)
        } else {
            (g, l + d.abs())
        }
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let Some(first) = rsi_from_averages(avg_gain, avg_loss) else {
        return out;
    };
    out[period] = Some(first);

    // deltas[i] is the change into closes[i + 1].
    for (i, &delta) in deltas.iter().enumerate().skip(period) {
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);

        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => out[i + 1] = Some(rsi),
            None => break,
        }
    }

    out
}

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    rsi.is_finite().then_some(rsi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defined(series: &[Option<f64>]) -> Vec<f64> {
        series.iter().flatten().copied().collect()
    }

    #[test]
    fn rsi_empty_input() {
        assert!(rsi_series(&[], 14).is_empty());
    }

    #[test]
    fn rsi_insufficient_data() {
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        assert!(rsi_series(&closes, 14).iter().all(Option::is_none));
    }

    #[test]
    fn rsi_first_value_at_period() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let series = rsi_series(&closes, 14);
        assert_eq!(series.len(), 30);
        assert!(series[13].is_none());
        assert!(series[14].is_some());
        assert!(series[29].is_some());
    }

    #[test]
    fn rsi_all_gains() {
        let closes: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        for v in defined(&rsi_series(&closes, 14)) {
            assert!((v - 100.0).abs() < 1e-10, "expected 100.0, got {v}");
        }
    }

    #[test]
    fn rsi_all_losses() {
        let closes: Vec<f64> = (1..=30).rev().map(|x| x as f64).collect();
        for v in defined(&rsi_series(&closes, 14)) {
            assert!(v.abs() < 1e-10, "expected 0.0, got {v}");
        }
    }

    #[test]
    fn rsi_flat_market() {
        let closes = vec![100.0; 30];
        for v in defined(&rsi_series(&closes, 14)) {
            assert!((v - 50.0).abs() < 1e-10, "expected 50.0, got {v}");
        }
    }

    #[test]
    fn rsi_range_check() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08,
            45.89, 46.03, 44.18, 44.22, 44.57, 43.42, 42.66, 43.13,
        ];
        let values = defined(&rsi_series(&closes, 14));
        assert_eq!(values.len(), 4);
        for v in values {
            assert!((DOMAIN.0..=DOMAIN.1).contains(&v), "RSI {v} out of range");
        }
    }
}
