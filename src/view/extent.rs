// =============================================================================
// Y extents for the price, navigator and indicator panes
// =============================================================================

use serde::{Deserialize, Serialize};

use crate::types::{PriceField, SeriesPoint};

/// Fractions of the value span added below and above an extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub below: f64,
    pub above: f64,
}

impl Padding {
    pub const NONE: Padding = Padding {
        below: 0.0,
        above: 0.0,
    };

    /// `total` split evenly between both sides.
    pub fn symmetric(total: f64) -> Self {
        Self {
            below: total / 2.0,
            above: total / 2.0,
        }
    }

    fn apply(&self, lo: f64, hi: f64) -> (f64, f64) {
        let span = hi - lo;
        (lo - span * self.below, hi + span * self.above)
    }
}

/// Min/max over `fields` of every point, padded. `None` for an empty slice.
pub fn y_extent(points: &[SeriesPoint], fields: &[PriceField], padding: Padding) -> Option<(f64, f64)> {
    let values = points
        .iter()
        .flat_map(|p| fields.iter().map(move |f| f.of(p)));
    value_extent(values, padding)
}

/// Min/max of arbitrary values, ignoring NaN, padded.
pub fn value_extent(values: impl IntoIterator<Item = f64>, padding: Padding) -> Option<(f64, f64)> {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<(f64, f64)>, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })?;
    Some(padding.apply(lo, hi))
}

/// Extent centred on zero that contains every value, padded.
pub fn symmetrical_about_zero(values: impl IntoIterator<Item = f64>, padding: Padding) -> Option<(f64, f64)> {
    let (lo, hi) = value_extent(values, Padding::NONE)?;
    let half = lo.abs().max(hi.abs());
    Some(padding.apply(-half, half))
}
