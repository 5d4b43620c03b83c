// =============================================================================
// Domain utilities: pure helpers over view domains and the series
// =============================================================================
//
// Every function here takes its inputs by value or slice and returns a new
// range; none of them hold state. `data` is always sorted ascending by date.
// =============================================================================

use std::ops::Range;

use crate::types::{DateRange, SeriesPoint, Timestamp};

use super::discontinuity::Discontinuity;

/// `[first date, last date]` of the series, or `None` when it is empty.
pub fn date_extent(data: &[SeriesPoint]) -> Option<DateRange> {
    let (first, last) = (data.first()?, data.last()?);
    Some(DateRange::new(first.date, last.date))
}

/// A domain of the same included width as `domain`, centred on `center`,
/// shifted to stay inside the data.
///
/// A centre outside the data, or a domain at least as wide as the data,
/// yields the data extent itself.
pub fn center_on_date(
    discontinuity: &dyn Discontinuity,
    domain: DateRange,
    data: &[SeriesPoint],
    center: Timestamp,
) -> DateRange {
    let Some(extent) = date_extent(data) else {
        return domain.sorted();
    };
    let domain = domain.sorted();

    if !extent.contains(center) {
        return extent;
    }

    let width = discontinuity.distance(domain.start, domain.end);
    if width >= discontinuity.distance(extent.start, extent.end) {
        return extent;
    }

    let start = discontinuity.offset(center, -width / 2);
    let end = discontinuity.offset(center, width - width / 2);

    let shift = if end > extent.end {
        -discontinuity.distance(extent.end, end)
    } else if start < extent.start {
        discontinuity.distance(start, extent.start)
    } else {
        0
    };

    if shift == 0 {
        return DateRange::new(start, end);
    }
    DateRange::new(
        discontinuity.offset(start, shift),
        discontinuity.offset(end, shift),
    )
}

/// Index range of the points covering `domain`, padded by one point on each
/// side and clamped to the slice.
pub fn visible_range(domain: DateRange, data: &[SeriesPoint]) -> Range<usize> {
    let lo = data.partition_point(|p| p.date < domain.min());
    let hi = data.partition_point(|p| p.date <= domain.max());
    lo.saturating_sub(1)..(hi + 1).min(data.len())
}

pub fn filter_data_in_date_range(domain: DateRange, data: &[SeriesPoint]) -> &[SeriesPoint] {
    &data[visible_range(domain, data)]
}

/// [`move_to_latest_scaled`] with a ratio of one: keep the view's width.
pub fn move_to_latest(
    discontinuity: &dyn Discontinuity,
    view: DateRange,
    data_extent: DateRange,
) -> DateRange {
    move_to_latest_scaled(discontinuity, view, data_extent, 1.0)
}

/// A domain `ratio` times as wide as `view` (in included time) that ends on
/// the latest data date. Never wider than the data itself.
pub fn move_to_latest_scaled(
    discontinuity: &dyn Discontinuity,
    view: DateRange,
    data_extent: DateRange,
    ratio: f64,
) -> DateRange {
    let data_extent = data_extent.sorted();
    let data_width = discontinuity.distance(data_extent.start, data_extent.end);
    let view_width = discontinuity.distance(view.min(), view.max());
    let scaled = (ratio * view_width as f64).round() as i64;

    if scaled >= data_width {
        return data_extent;
    }
    DateRange::new(
        discontinuity.offset(data_extent.end, -scaled),
        data_extent.end,
    )
}

/// True when the view ends on the newest point of the series.
pub fn tracking_latest_data(domain: DateRange, data: &[SeriesPoint]) -> bool {
    data.last().is_some_and(|last| domain.max() == last.date)
}
