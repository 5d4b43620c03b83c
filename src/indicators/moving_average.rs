// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

pub const DEFAULT_PERIOD: usize = 5;

/// Mean of the `period` values ending at each index, maintained as a running
/// sum. Positions before the first full window are `None`.
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_known_values() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let sma = sma_series(&values, 3);
        assert_eq!(sma[..2], [None, None]);
        assert!((sma[2].unwrap() - 2.0).abs() < 1e-10);
        assert!((sma[5].unwrap() - 5.0).abs() < 1e-10);
    }

    #[test]
    fn sma_short_input() {
        assert!(sma_series(&[1.0, 2.0], 5).iter().all(Option::is_none));
        assert!(sma_series(&[1.0, 2.0], 0).iter().all(Option::is_none));
    }
}
