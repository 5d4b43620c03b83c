// =============================================================================
// Pan/Zoom Controller: turns gestures into clamped view domains
// =============================================================================
//
// A gesture starts by capturing the current view as an immutable `DateScale`
// together with the data extent and the tracking-latest flag. Each move then
// updates a (scale, translate) transform relative to that captured view and
// produces at most one new domain.
//
// Move pipeline:
//   1. candidate window in the captured view's pixel space
//   2. clamp the window so it never leaves the pannable extent
//   3. invert the window back to dates
//   4. zooming while tracking latest re-snaps to the newest data
//   5. clamp to the data extent, honouring discontinuities
//   6. a zero-width result resets the transform and emits nothing
// =============================================================================

use serde::Serialize;
use tracing::debug;

use crate::types::DateRange;

use super::scale::DateScale;
use super::window::move_to_latest;

/// Accumulated gesture transform: `pixel' = pixel * scale + translate`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoomTransform {
    pub scale: f64,
    pub translate: f64,
}

impl ZoomTransform {
    pub const IDENTITY: ZoomTransform = ZoomTransform {
        scale: 1.0,
        translate: 0.0,
    };

    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}

impl Default for ZoomTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// What a gesture sees when it starts.
#[derive(Debug, Clone)]
pub struct GestureContext {
    /// Scale over the view domain at gesture start, range `[0, width]`.
    pub view: DateScale,
    pub data_extent: DateRange,
    pub tracking_latest: bool,
}

#[derive(Debug, Clone)]
enum GestureState {
    Idle,
    Panning(GestureContext),
    Zooming(GestureContext),
}

/// Result of a single gesture move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    /// A new view domain to publish.
    ViewChange(DateRange),
    /// The data has no width to pan over; nothing changes.
    Absorbed,
    /// The result had zero width; the transform was reset.
    Rejected,
    /// Disallowed kind or no gesture in progress.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct PanZoomController {
    allow_pan: bool,
    allow_zoom: bool,
    transform: ZoomTransform,
    state: GestureState,
}

impl Default for PanZoomController {
    fn default() -> Self {
        Self::new()
    }
}

impl PanZoomController {
    pub fn new() -> Self {
        Self {
            allow_pan: true,
            allow_zoom: true,
            transform: ZoomTransform::IDENTITY,
            state: GestureState::Idle,
        }
    }

    pub fn with_allow_pan(mut self, allow: bool) -> Self {
        self.allow_pan = allow;
        self
    }

    pub fn with_allow_zoom(mut self, allow: bool) -> Self {
        self.allow_zoom = allow;
        self
    }

    pub fn allow_pan(&self) -> bool {
        self.allow_pan
    }

    pub fn allow_zoom(&self) -> bool {
        self.allow_zoom
    }

    pub fn transform(&self) -> ZoomTransform {
        self.transform
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, GestureState::Idle)
    }

    fn reset(&mut self) {
        self.transform = ZoomTransform::IDENTITY;
    }

    // -------------------------------------------------------------------------
    // Gesture lifecycle
    // -------------------------------------------------------------------------

    pub fn begin_pan(&mut self, ctx: GestureContext) {
        self.reset();
        self.state = GestureState::Panning(ctx);
    }

    pub fn begin_zoom(&mut self, ctx: GestureContext) {
        self.reset();
        self.state = GestureState::Zooming(ctx);
    }

    pub fn end_gesture(&mut self) {
        self.reset();
        self.state = GestureState::Idle;
    }

    /// Drag by `dx` pixels (positive reveals older data).
    pub fn pan_by(&mut self, dx: f64) -> GestureOutcome {
        let candidate = ZoomTransform {
            scale: self.transform.scale,
            translate: self.transform.translate + dx,
        };
        self.apply(candidate)
    }

    /// Scale by `factor` around the pixel `anchor` (factor > 1 zooms in).
    pub fn zoom_by(&mut self, factor: f64, anchor: f64) -> GestureOutcome {
        if !(factor.is_finite() && factor > 0.0) {
            return GestureOutcome::Ignored;
        }
        let t = self.transform;
        let candidate = ZoomTransform {
            scale: t.scale * factor,
            translate: anchor - (anchor - t.translate) * factor,
        };
        self.apply(candidate)
    }

    fn apply(&mut self, candidate: ZoomTransform) -> GestureOutcome {
        let ctx = match &self.state {
            GestureState::Idle => return GestureOutcome::Ignored,
            GestureState::Panning(ctx) | GestureState::Zooming(ctx) => ctx.clone(),
        };

        let zoomed = candidate.scale != 1.0;
        if (zoomed && !self.allow_zoom) || (!zoomed && !self.allow_pan) {
            self.reset();
            return GestureOutcome::Ignored;
        }

        let k = candidate.scale;
        let (r0, r1) = ctx.view.range();
        let data = ctx.data_extent.sorted();

        // 1. Candidate window, in the captured view's pixels.
        let mut w0 = (r0 - candidate.translate) / k;
        let mut w1 = (r1 - candidate.translate) / k;
        let p0 = ctx.view.scale(data.start);
        let p1 = ctx.view.scale(data.end);

        // 2. Clamp against the pannable extent. Once shifted inside, the
        // window overlaps the data unless the data has no width at all.
        let pannable = p1 - p0;
        if pannable <= 0.0 {
            debug!(p0, p1, "gesture absorbed at data boundary");
            return GestureOutcome::Absorbed;
        }

        let span = w1 - w0;
        let (mut at_start, mut at_end) = (false, false);
        if span >= pannable {
            (w0, w1) = (p0, p1);
            (at_start, at_end) = (true, true);
        } else if w0 < p0 {
            (w0, w1) = (p0, p0 + span);
            at_start = true;
        } else if w1 > p1 {
            (w0, w1) = (p1 - span, p1);
            at_end = true;
        }
        let clamped = ZoomTransform {
            scale: k,
            translate: r0 - w0 * k,
        };

        // 3. Back to dates; edges snap to the exact data bounds.
        let mut start = if at_start { data.start } else { ctx.view.invert(w0) };
        let mut end = if at_end { data.end } else { ctx.view.invert(w1) };

        // 4. Zooming keeps a live view pinned to the newest data.
        if zoomed && ctx.tracking_latest && !(at_start && at_end) {
            let disc = ctx.view.discontinuity();
            let latest = move_to_latest(disc.as_ref(), DateRange::new(start, end), data);
            start = latest.start;
            end = latest.end;
        }

        // 5. Clamp to the data extent.
        let disc = ctx.view.discontinuity();
        start = disc.clamp_up(start.max(data.start));
        end = disc.clamp_down(end.min(data.end));

        // 6. Zero width never escapes.
        if end <= start {
            debug!(start, end, "zero-width view rejected, transform reset");
            self.reset();
            return GestureOutcome::Rejected;
        }

        self.transform = clamped;
        GestureOutcome::ViewChange(DateRange::new(start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::types::{Timestamp, MILLIS_PER_DAY};
    use crate::view::discontinuity::{Identity, SkipWeekends};

    const MONDAY: Timestamp = 1_704_067_200_000;

    fn day(n: i64) -> Timestamp {
        MONDAY + n * MILLIS_PER_DAY
    }

    fn ctx(view: (i64, i64), data: (i64, i64), tracking: bool) -> GestureContext {
        GestureContext {
            view: DateScale::new(
                DateRange::new(day(view.0), day(view.1)),
                (0.0, 1000.0),
                Arc::new(Identity),
            ),
            data_extent: DateRange::new(day(data.0), day(data.1)),
            tracking_latest: tracking,
        }
    }

    #[test]
    fn pan_past_start_clamps_to_data_start() {
        let mut zc = PanZoomController::new();
        zc.begin_pan(ctx((5, 15), (0, 20), false));
        let outcome = zc.pan_by(800.0);
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(day(0), day(10))));
        assert!((zc.transform().translate - 500.0).abs() < 1e-9);
    }

    #[test]
    fn pan_past_end_clamps_to_data_end() {
        let mut zc = PanZoomController::new();
        zc.begin_pan(ctx((5, 15), (0, 20), false));
        let outcome = zc.pan_by(-5000.0);
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(day(10), day(20))));
    }

    #[test]
    fn plain_pan_shifts_domain() {
        let mut zc = PanZoomController::new();
        zc.begin_pan(ctx((5, 15), (0, 20), false));
        // 100 px = 1 day in a 10-day, 1000 px view.
        let outcome = zc.pan_by(-100.0);
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(day(6), day(16))));
    }

    #[test]
    fn zero_width_zoom_is_rejected_and_reset() {
        let mut zc = PanZoomController::new();
        zc.begin_zoom(ctx((0, 10), (0, 10), false));
        let outcome = zc.zoom_by(1e12, 0.0);
        assert_eq!(outcome, GestureOutcome::Rejected);
        assert!(zc.transform().is_identity());
    }

    #[test]
    fn zoom_out_beyond_data_shows_everything() {
        let mut zc = PanZoomController::new();
        zc.begin_zoom(ctx((8, 12), (0, 20), false));
        let outcome = zc.zoom_by(0.01, 500.0);
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(day(0), day(20))));
    }

    #[test]
    fn zoom_in_while_tracking_stays_on_latest() {
        let mut zc = PanZoomController::new();
        zc.begin_zoom(ctx((10, 20), (0, 20), true));
        // Zoom 2x about the centre: arithmetic result is [12.5, 17.5].
        let outcome = zc.zoom_by(2.0, 500.0);
        let expected_start = day(20) - 5 * MILLIS_PER_DAY;
        assert_eq!(outcome, GestureOutcome::ViewChange(DateRange::new(expected_start, day(20))));
    }

    #[test]
    fn zoom_in_without_tracking_uses_anchor() {
        let mut zc = PanZoomController::new();
        zc.begin_zoom(ctx((10, 20), (0, 20), false));
        let outcome = zc.zoom_by(2.0, 500.0);
        let half = MILLIS_PER_DAY / 2;
        assert_eq!(
            outcome,
            GestureOutcome::ViewChange(DateRange::new(day(12) + half, day(17) + half))
        );
    }

    #[test]
    fn disallowed_pan_resets_and_is_ignored() {
        let mut zc = PanZoomController::new().with_allow_pan(false);
        zc.begin_pan(ctx((5, 15), (0, 20), false));
        assert_eq!(zc.pan_by(100.0), GestureOutcome::Ignored);
        assert!(zc.transform().is_identity());
        // Zooming is still allowed.
        assert!(matches!(zc.zoom_by(2.0, 500.0), GestureOutcome::ViewChange(_)));
    }

    #[test]
    fn window_outside_data_is_pulled_back() {
        let mut zc = PanZoomController::new();
        // View entirely right of the data.
        zc.begin_pan(ctx((30, 40), (0, 20), false));
        assert_eq!(
            zc.pan_by(-10.0),
            GestureOutcome::ViewChange(DateRange::new(day(10), day(20)))
        );
    }

    #[test]
    fn single_point_data_absorbs_gestures() {
        let mut zc = PanZoomController::new();
        zc.begin_pan(ctx((0, 10), (5, 5), false));
        assert_eq!(zc.pan_by(50.0), GestureOutcome::Absorbed);
    }

    #[test]
    fn moves_while_idle_are_ignored() {
        let mut zc = PanZoomController::new();
        assert_eq!(zc.pan_by(10.0), GestureOutcome::Ignored);
        zc.begin_pan(ctx((5, 15), (0, 20), false));
        zc.end_gesture();
        assert!(zc.is_idle());
        assert_eq!(zc.zoom_by(2.0, 0.0), GestureOutcome::Ignored);
    }

    #[test]
    fn clamped_edges_respect_weekends() {
        let mut zc = PanZoomController::new();
        // Data ends on a Saturday midnight; view Mon..Fri of week two.
        let ctx = GestureContext {
            view: DateScale::new(DateRange::new(day(7), day(11)), (0.0, 1000.0), Arc::new(SkipWeekends)),
            data_extent: DateRange::new(day(0), day(12)),
            tracking_latest: false,
        };
        zc.begin_pan(ctx);
        match zc.pan_by(-10_000.0) {
            GestureOutcome::ViewChange(domain) => {
                assert_eq!(domain.end, day(12));
                assert!(domain.start >= day(7));
            }
            other => panic!("expected view change, got {other:?}"),
        }
    }
}
