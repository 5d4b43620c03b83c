// =============================================================================
// Date Scale: linear date <-> pixel mapping over included time
// =============================================================================

use std::fmt;
use std::sync::Arc;

use crate::types::{DateRange, Timestamp};

use super::discontinuity::Discontinuity;

/// Immutable mapping from a date domain to a pixel range.
///
/// Distances are measured with the discontinuity provider, so excluded spans
/// occupy zero pixels. Each gesture captures its own copy; nothing mutates a
/// scale after construction.
#[derive(Clone)]
pub struct DateScale {
    domain: DateRange,
    range: (f64, f64),
    discontinuity: Arc<dyn Discontinuity>,
}

impl DateScale {
    pub fn new(domain: DateRange, range: (f64, f64), discontinuity: Arc<dyn Discontinuity>) -> Self {
        Self {
            domain: domain.sorted(),
            range,
            discontinuity,
        }
    }

    pub fn domain(&self) -> DateRange {
        self.domain
    }

    pub fn range(&self) -> (f64, f64) {
        self.range
    }

    pub fn discontinuity(&self) -> &Arc<dyn Discontinuity> {
        &self.discontinuity
    }

    /// A copy of this scale over a different domain.
    pub fn with_domain(&self, domain: DateRange) -> Self {
        Self::new(domain, self.range, Arc::clone(&self.discontinuity))
    }

    fn domain_span(&self) -> f64 {
        self.discontinuity
            .distance(self.domain.start, self.domain.end) as f64
    }

    /// Pixel position of `date`. Dates outside the domain extrapolate.
    pub fn scale(&self, date: Timestamp) -> f64 {
        let span = self.domain_span();
        if span == 0.0 {
            return self.range.0;
        }
        let d = self.discontinuity.distance(self.domain.start, date) as f64;
        self.range.0 + d / span * (self.range.1 - self.range.0)
    }

    /// Date at pixel `px`, rounded to the nearest millisecond.
    pub fn invert(&self, px: f64) -> Timestamp {
        let width = self.range.1 - self.range.0;
        if width == 0.0 {
            return self.domain.start;
        }
        let ms = ((px - self.range.0) / width * self.domain_span()).round() as i64;
        self.discontinuity.offset(self.domain.start, ms)
    }
}

impl fmt::Debug for DateScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DateScale")
            .field("domain", &self.domain)
            .field("range", &self.range)
            .field("discontinuity", &self.discontinuity.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MILLIS_PER_DAY;
    use crate::view::discontinuity::{Identity, SkipWeekends};

    const MONDAY: Timestamp = 1_704_067_200_000;

    fn day(n: i64) -> Timestamp {
        MONDAY + n * MILLIS_PER_DAY
    }

    #[test]
    fn identity_scale_is_linear() {
        let s = DateScale::new(DateRange::new(day(0), day(10)), (0.0, 1000.0), Arc::new(Identity));
        assert!((s.scale(day(5)) - 500.0).abs() < 1e-9);
        assert!((s.scale(day(-5)) + 500.0).abs() < 1e-9);
        assert_eq!(s.invert(250.0), day(0) + 10 * MILLIS_PER_DAY / 4);
    }

    #[test]
    fn weekends_take_no_pixels() {
        // Mon..next Mon spans five included days.
        let s = DateScale::new(DateRange::new(day(0), day(7)), (0.0, 500.0), Arc::new(SkipWeekends));
        assert!((s.scale(day(5)) - 500.0).abs() < 1e-9);
        assert!((s.scale(day(6)) - 500.0).abs() < 1e-9);
        assert!((s.scale(day(7)) - 500.0).abs() < 1e-9);
        assert_eq!(s.invert(400.0), day(4));
    }

    #[test]
    fn zero_width_domain_maps_to_range_start() {
        let s = DateScale::new(DateRange::new(day(1), day(1)), (10.0, 20.0), Arc::new(Identity));
        assert_eq!(s.scale(day(3)), 10.0);
    }

    #[test]
    fn with_domain_keeps_range_and_provider() {
        let s = DateScale::new(DateRange::new(day(0), day(10)), (0.0, 100.0), Arc::new(SkipWeekends));
        let t = s.with_domain(DateRange::new(day(7), day(14)));
        assert_eq!(t.range(), (0.0, 100.0));
        assert_eq!(t.domain().start, day(7));
        assert_eq!(t.discontinuity().kind(), s.discontinuity().kind());
    }
}
