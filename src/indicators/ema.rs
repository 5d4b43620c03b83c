// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = value_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The first EMA value is seeded with the SMA of the first `period` values and
// sits at index `period - 1`; earlier positions are `None`.
// =============================================================================

/// EMA of `values`, aligned by index with the input.
///
/// # Edge cases
/// - `period == 0` or too little data => all `None`
/// - A non-finite intermediate value ends the series; later positions stay
///   `None` rather than carrying a broken value forward.
pub fn ema_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let multiplier = 2.0 / (period + 1) as f64;

    let seed: f64 = values[..period].iter().sum::<f64>() / period as f64;
    if !seed.is_finite() {
        return out;
    }
    out[period - 1] = Some(seed);

    let mut prev = seed;
    for (i, &value) in values.iter().enumerate().skip(period) {
        let ema = value * multiplier + prev * (1.0 - multiplier);
        if !ema.is_finite() {
            break;
        }
        out[i] = Some(ema);
        prev = ema;
    }
    out
}

/// EMA over a series that itself has a warm-up prefix of `None`s.
///
/// The leading `None`s are skipped and the result is re-aligned to the input.
pub fn ema_of_optional(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let offset = values.iter().position(Option::is_some).unwrap_or(values.len());
    let defined: Vec<f64> = values[offset..].iter().map_while(|v| *v).collect();

    let mut out = vec![None; values.len()];
    for (i, v) in ema_series(&defined, period).into_iter().enumerate() {
        out[offset + i] = v;
    }
    out
}
