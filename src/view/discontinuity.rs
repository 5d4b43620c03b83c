// =============================================================================
// Discontinuity Providers: time spans excluded from a chart's x domain
// =============================================================================
//
// A discontinuity provider measures and walks time while skipping excluded
// spans. Stock data has no trading at weekends, so the x axis of a daily
// equity chart collapses Saturday and Sunday to zero width.
//
// All calendar arithmetic is UTC.
// =============================================================================

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, MILLIS_PER_DAY, MILLIS_PER_WEEK};

const MILLIS_PER_WORK_WEEK: i64 = 5 * MILLIS_PER_DAY;

/// Policy deciding which spans of time are excluded from a domain.
pub trait Discontinuity: Debug + Send + Sync {
    /// Included milliseconds between `start` and `end` (negative when
    /// `end < start`).
    fn distance(&self, start: Timestamp, end: Timestamp) -> i64;

    /// `date` shifted by `ms` milliseconds of included time.
    fn offset(&self, date: Timestamp, ms: i64) -> Timestamp;

    /// Nearest valid date at or after `date`.
    fn clamp_up(&self, date: Timestamp) -> Timestamp;

    /// Nearest valid date at or before `date`.
    fn clamp_down(&self, date: Timestamp) -> Timestamp;

    fn copy(&self) -> Box<dyn Discontinuity>;

    fn kind(&self) -> DiscontinuityKind;
}

/// Serialisable tag naming a provider, for snapshots and config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscontinuityKind {
    #[default]
    Identity,
    SkipWeekends,
}

impl DiscontinuityKind {
    pub fn provider(&self) -> Arc<dyn Discontinuity> {
        match self {
            Self::Identity => Arc::new(Identity),
            Self::SkipWeekends => Arc::new(SkipWeekends),
        }
    }
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Continuous time: nothing is excluded.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Discontinuity for Identity {
    fn distance(&self, start: Timestamp, end: Timestamp) -> i64 {
        end - start
    }

    fn offset(&self, date: Timestamp, ms: i64) -> Timestamp {
        date + ms
    }

    fn clamp_up(&self, date: Timestamp) -> Timestamp {
        date
    }

    fn clamp_down(&self, date: Timestamp) -> Timestamp {
        date
    }

    fn copy(&self) -> Box<dyn Discontinuity> {
        Box::new(*self)
    }

    fn kind(&self) -> DiscontinuityKind {
        DiscontinuityKind::Identity
    }
}

// ---------------------------------------------------------------------------
// Skip weekends
// ---------------------------------------------------------------------------

/// Excludes Saturday 00:00 to Monday 00:00 (UTC) of every week.
///
/// Saturday 00:00 is treated as the exclusive end of Friday, so
/// `clamp_down` of any weekend instant is the Saturday midnight and
/// `clamp_up` is the following Monday midnight.
#[derive(Debug, Clone, Copy, Default)]
pub struct SkipWeekends;

/// Day of week with Sunday = 0 (1970-01-01 was a Thursday).
fn day_of_week(date: Timestamp) -> i64 {
    (date.div_euclid(MILLIS_PER_DAY) + 4).rem_euclid(7)
}

fn day_floor(date: Timestamp) -> Timestamp {
    date.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY
}

fn is_weekend(date: Timestamp) -> bool {
    matches!(day_of_week(date), 0 | 6)
}

/// First Saturday midnight at or after `date`.
fn saturday_ceil(date: Timestamp) -> Timestamp {
    let floor = day_floor(date);
    let days_until = (6 - day_of_week(floor)).rem_euclid(7);
    let candidate = floor + days_until * MILLIS_PER_DAY;
    if candidate < date {
        candidate + MILLIS_PER_WEEK
    } else {
        candidate
    }
}

/// Last Monday midnight at or before `date`.
fn monday_floor(date: Timestamp) -> Timestamp {
    let floor = day_floor(date);
    let days_since = (day_of_week(floor) + 6).rem_euclid(7);
    floor - days_since * MILLIS_PER_DAY
}

impl Discontinuity for SkipWeekends {
    fn distance(&self, start: Timestamp, end: Timestamp) -> i64 {
        if end < start {
            return -self.distance(end, start);
        }

        let start = self.clamp_up(start);
        let end = self.clamp_down(end);
        if end <= start {
            return 0;
        }

        let offset_start = saturday_ceil(start);
        if end < offset_start {
            return end - start;
        }
        let ms_added = offset_start - start;

        let offset_end = saturday_ceil(end);
        let ms_removed = offset_end - end;

        let weeks = (offset_end - offset_start) / MILLIS_PER_WEEK;
        weeks * MILLIS_PER_WORK_WEEK + ms_added - ms_removed
    }

    fn offset(&self, date: Timestamp, ms: i64) -> Timestamp {
        let mut date = self.clamp_up(date);
        let mut remaining = ms;

        if remaining < 0 {
            let start_of_week = monday_floor(date);
            remaining += date - start_of_week;
            if remaining >= 0 {
                return date + ms;
            }

            // Walk back from the Monday of the week before, whole work weeks
            // first, then the remainder inside the target week.
            let weeks = remaining.div_euclid(MILLIS_PER_WORK_WEEK);
            remaining -= weeks * MILLIS_PER_WORK_WEEK;
            date = start_of_week + weeks * MILLIS_PER_WEEK;
            date + remaining
        } else {
            let end_of_week = saturday_ceil(date);
            remaining -= end_of_week - date;
            if remaining < 0 {
                return date + ms;
            }

            date = end_of_week + 2 * MILLIS_PER_DAY;
            let complete_weeks = remaining.div_euclid(MILLIS_PER_WORK_WEEK);
            date += complete_weeks * MILLIS_PER_WEEK;
            remaining -= complete_weeks * MILLIS_PER_WORK_WEEK;
            date + remaining
        }
    }

    fn clamp_up(&self, date: Timestamp) -> Timestamp {
        if !is_weekend(date) {
            return date;
        }
        let days_to_add = if day_of_week(date) == 0 { 1 } else { 2 };
        day_floor(date) + days_to_add * MILLIS_PER_DAY
    }

    fn clamp_down(&self, date: Timestamp) -> Timestamp {
        if !is_weekend(date) {
            return date;
        }
        let days_to_subtract = if day_of_week(date) == 0 { 1 } else { 0 };
        day_floor(date) - days_to_subtract * MILLIS_PER_DAY
    }

    fn copy(&self) -> Box<dyn Discontinuity> {
        Box::new(*self)
    }

    fn kind(&self) -> DiscontinuityKind {
        DiscontinuityKind::SkipWeekends
    }
}
