// =============================================================================
// Navigator: down-sampled overview strip with a brush over the view domain
// =============================================================================

use std::sync::Arc;

use crate::types::{DateRange, PriceField, SeriesPoint, Timestamp};

use super::discontinuity::Discontinuity;
use super::extent::{y_extent, Padding};
use super::window::{center_on_date, date_extent, filter_data_in_date_range};
use super::zoom::PanZoomController;

pub const DEFAULT_SAMPLES: usize = 200;

/// Headroom above the navigator's price line.
pub const NAVIGATOR_PADDING: Padding = Padding {
    below: 0.0,
    above: 0.04,
};

#[derive(Debug, Clone)]
pub struct Navigator {
    samples: usize,
    zoom: PanZoomController,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLES)
    }
}

impl Navigator {
    /// The navigator zooms but never pans; dragging moves the brush instead.
    pub fn new(samples: usize) -> Self {
        Self {
            samples: samples.max(1),
            zoom: PanZoomController::new().with_allow_pan(false),
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    pub fn zoom(&self) -> &PanZoomController {
        &self.zoom
    }

    pub fn zoom_mut(&mut self) -> &mut PanZoomController {
        &mut self.zoom
    }

    /// The series reduced to about `samples` points.
    pub fn sample(&self, data: &[SeriesPoint]) -> Vec<SeriesPoint> {
        let bucket_size = (data.len() / self.samples).max(1);
        largest_triangle_three_buckets(data, bucket_size)
    }

    /// Price extent of the sampled overview.
    pub fn y_domain(&self, sampled: &[SeriesPoint]) -> Option<(f64, f64)> {
        let extent = date_extent(sampled)?;
        let visible = filter_data_in_date_range(extent, sampled);
        y_extent(visible, &[PriceField::Low, PriceField::High], NAVIGATOR_PADDING)
    }

    /// A brush drag. Non-empty extents become the view, clamped to the data.
    pub fn brush_moved(&self, brush: DateRange, data_extent: DateRange) -> Option<DateRange> {
        if brush.is_empty() {
            return None;
        }
        let brush = brush.sorted();
        let data_extent = data_extent.sorted();
        let start = brush.start.max(data_extent.start);
        let end = brush.end.min(data_extent.end);
        (end > start).then(|| DateRange::new(start, end))
    }

    /// A brush release. An empty brush is a click: centre the current view on
    /// it.
    pub fn brush_ended(
        &self,
        brush: DateRange,
        view: DateRange,
        data: &[SeriesPoint],
        discontinuity: &Arc<dyn Discontinuity>,
    ) -> Option<DateRange> {
        if !brush.is_empty() {
            return None;
        }
        let click: Timestamp = brush.start;
        Some(center_on_date(discontinuity.as_ref(), view, data, click))
    }
}

/// Largest-Triangle-Three-Buckets over (date, close).
///
/// Keeps the first and last points and, from each bucket of interior points,
/// the one forming the largest triangle with the previously kept point and the
/// average of the next bucket.
pub fn largest_triangle_three_buckets(data: &[SeriesPoint], bucket_size: usize) -> Vec<SeriesPoint> {
    if bucket_size <= 1 || data.len() <= 2 {
        return data.to_vec();
    }

    let interior = &data[1..data.len() - 1];
    let buckets: Vec<&[SeriesPoint]> = interior.chunks(bucket_size).collect();

    let mut sampled = Vec::with_capacity(buckets.len() + 2);
    sampled.push(data[0]);
    let mut previous = data[0];

    for (i, bucket) in buckets.iter().enumerate() {
        let (avg_x, avg_y) = match buckets.get(i + 1) {
            Some(next) => {
                let n = next.len() as f64;
                (
                    next.iter().map(|p| p.date as f64).sum::<f64>() / n,
                    next.iter().map(|p| p.close).sum::<f64>() / n,
                )
            }
            None => {
                let last = data[data.len() - 1];
                (last.date as f64, last.close)
            }
        };

        let (px, py) = (previous.date as f64, previous.close);
        let mut best = bucket[0];
        let mut best_area = f64::MIN;
        for point in bucket.iter() {
            let area = ((px - avg_x) * (point.close - py) - (px - point.date as f64) * (avg_y - py)).abs();
            if area > best_area {
                best_area = area;
                best = *point;
            }
        }
        sampled.push(best);
        previous = best;
    }

    sampled.push(data[data.len() - 1]);
    sampled
}
