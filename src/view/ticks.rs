// =============================================================================
// Time-axis tick selection
// =============================================================================
//
// Picks a human-friendly interval from a fixed ladder so that a domain gets
// roughly `count` ticks, never more, and never finer than an optional floor
// (the configured period: a daily chart never shows hourly ticks). Spans
// beyond the ladder get a synthetic multi-year step.
// =============================================================================

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ChartError;
use crate::types::{
    DateRange, Timestamp, MILLIS_PER_DAY, MILLIS_PER_HOUR, MILLIS_PER_MINUTE, MILLIS_PER_SECOND,
    MILLIS_PER_WEEK,
};

use super::discontinuity::Discontinuity;

/// Month and year lengths used only to rank intervals.
const MILLIS_PER_MONTH: i64 = 30 * MILLIS_PER_DAY;
const MILLIS_PER_YEAR: i64 = 365 * MILLIS_PER_DAY;

const TIME_FORMAT: &str = "%H:%M,%d %b";

const DEFAULT_TICK_COUNT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickInterval {
    pub unit: TickUnit,
    pub step: u32,
    /// Nominal length in milliseconds.
    pub duration: i64,
    /// strftime pattern; a comma separates the two label lines.
    pub format: &'static str,
}

const fn interval(unit: TickUnit, step: u32, duration: i64, format: &'static str) -> TickInterval {
    TickInterval {
        unit,
        step,
        duration,
        format,
    }
}

/// Candidate intervals ordered by duration. Two-day steps are absent because
/// they read badly once weekends are skipped.
pub const LADDER: [TickInterval; 17] = [
    interval(TickUnit::Second, 1, MILLIS_PER_SECOND, TIME_FORMAT),
    interval(TickUnit::Second, 5, 5 * MILLIS_PER_SECOND, TIME_FORMAT),
    interval(TickUnit::Second, 15, 15 * MILLIS_PER_SECOND, TIME_FORMAT),
    interval(TickUnit::Second, 30, 30 * MILLIS_PER_SECOND, TIME_FORMAT),
    interval(TickUnit::Minute, 1, MILLIS_PER_MINUTE, TIME_FORMAT),
    interval(TickUnit::Minute, 5, 5 * MILLIS_PER_MINUTE, TIME_FORMAT),
    interval(TickUnit::Minute, 15, 15 * MILLIS_PER_MINUTE, TIME_FORMAT),
    interval(TickUnit::Minute, 30, 30 * MILLIS_PER_MINUTE, TIME_FORMAT),
    interval(TickUnit::Hour, 1, MILLIS_PER_HOUR, TIME_FORMAT),
    interval(TickUnit::Hour, 3, 3 * MILLIS_PER_HOUR, TIME_FORMAT),
    interval(TickUnit::Hour, 6, 6 * MILLIS_PER_HOUR, TIME_FORMAT),
    interval(TickUnit::Hour, 12, 12 * MILLIS_PER_HOUR, TIME_FORMAT),
    interval(TickUnit::Day, 1, MILLIS_PER_DAY, "%a %d,%b %Y"),
    interval(TickUnit::Week, 1, MILLIS_PER_WEEK, "%d %b,%Y"),
    interval(TickUnit::Month, 1, MILLIS_PER_MONTH, "%B,%Y"),
    interval(TickUnit::Month, 3, 3 * MILLIS_PER_MONTH, "%B,%Y"),
    interval(TickUnit::Year, 1, MILLIS_PER_YEAR, "%Y"),
];

/// Chosen interval plus the tick dates it produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSelection {
    pub interval: TickInterval,
    pub ticks: Vec<Timestamp>,
}

impl TickSelection {
    pub fn format(&self) -> &'static str {
        self.interval.format
    }

    pub fn format_tick(&self, date: Timestamp) -> String {
        DateTime::<Utc>::from_timestamp_millis(date)
            .map(|dt| dt.format(self.interval.format).to_string())
            .unwrap_or_default()
    }

    /// Every tick rendered with the chosen format.
    pub fn labels(&self) -> Vec<String> {
        self.ticks.iter().map(|t| self.format_tick(*t)).collect()
    }
}

/// Number of ticks that fit `available_px`, at least `minimum`.
pub fn responsive_tick_count(available_px: f64, px_per_tick: f64, minimum: usize) -> usize {
    if !(px_per_tick > 0.0) || !available_px.is_finite() {
        return minimum;
    }
    ((available_px / px_per_tick).ceil().max(0.0) as usize).max(minimum)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSelector {
    count: usize,
    minimum: Option<usize>,
}

impl Default for TickSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl TickSelector {
    pub fn new() -> Self {
        Self {
            count: DEFAULT_TICK_COUNT,
            minimum: None,
        }
    }

    /// Target tick count (treated as at least one).
    pub fn with_count(mut self, count: usize) -> Self {
        self.count = count.max(1);
        self
    }

    /// Floor the selection at `(unit, step)`, which must be on the ladder.
    pub fn with_minimum_interval(mut self, unit: TickUnit, step: u32) -> Result<Self, ChartError> {
        let index = LADDER
            .iter()
            .position(|iv| iv.unit == unit && iv.step == step)
            .ok_or_else(|| {
                ChartError::InvalidConfiguration(format!(
                    "minimum tick interval {unit:?} x {step} is not supported"
                ))
            })?;
        self.minimum = Some(index);
        Ok(self)
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn minimum_interval(&self) -> Option<TickInterval> {
        self.minimum.map(|i| LADDER[i])
    }

    /// Ticks inside excluded spans snap forward to the next included date;
    /// snapped ticks past the domain end are dropped.
    pub fn select(&self, domain: DateRange, discontinuity: &dyn Discontinuity) -> TickSelection {
        let extent = domain.sorted();
        let interval = self.choose_interval(extent, discontinuity);
        let mut ticks: Vec<Timestamp> = generate_ticks(&interval, extent)
            .into_iter()
            .map(|t| discontinuity.clamp_up(t))
            .filter(|t| *t <= extent.end)
            .collect();
        ticks.dedup();
        TickSelection { interval, ticks }
    }

    fn choose_interval(&self, extent: DateRange, discontinuity: &dyn Discontinuity) -> TickInterval {
        let span = discontinuity.distance(extent.start, extent.end) as f64;
        let count = self.count as f64;
        let target = span / count;

        let i = LADDER.partition_point(|iv| (iv.duration as f64) <= target);
        if i == LADDER.len() {
            let mut chosen = multi_year_interval(extent, count);
            let mut adjusted = count;
            while span / chosen.duration as f64 > count && adjusted >= 2.0 {
                adjusted -= 1.0;
                chosen = multi_year_interval(extent, adjusted);
            }
            return chosen;
        }

        let mut index = if i > 0
            && target / (LADDER[i - 1].duration as f64) < (LADDER[i].duration as f64) / target
        {
            i - 1
        } else {
            i
        };
        while span / (LADDER[index].duration as f64) > count && index < LADDER.len() - 1 {
            index += 1;
        }
        LADDER[index.max(self.minimum.unwrap_or(0))]
    }
}

fn multi_year_interval(extent: DateRange, count: f64) -> TickInterval {
    let span_years = (extent.end - extent.start) as f64 / MILLIS_PER_YEAR as f64;
    let mut step = 10f64.powf((span_years / count).log10().floor());
    let err = count / span_years * step;
    if err <= 0.15 {
        step *= 10.0;
    } else if err <= 0.35 {
        step *= 5.0;
    } else if err <= 0.75 {
        step *= 2.0;
    }
    let step = if step.is_finite() { step.round().max(1.0) as u32 } else { 1 };
    interval(TickUnit::Year, step, step as i64 * MILLIS_PER_YEAR, "%Y")
}

// ---------------------------------------------------------------------------
// Calendar-aligned tick generation (UTC, inclusive upper bound)
// ---------------------------------------------------------------------------

fn generate_ticks(interval: &TickInterval, extent: DateRange) -> Vec<Timestamp> {
    let step = interval.step.max(1);
    match interval.unit {
        TickUnit::Second => fixed_ticks(MILLIS_PER_SECOND * step as i64, extent),
        TickUnit::Minute => fixed_ticks(MILLIS_PER_MINUTE * step as i64, extent),
        TickUnit::Hour => fixed_ticks(MILLIS_PER_HOUR * step as i64, extent),
        TickUnit::Day => day_ticks(step, extent),
        TickUnit::Week => week_ticks(step, extent),
        TickUnit::Month => month_ticks(extent, |_, month0| month0 % step == 0),
        TickUnit::Year => month_ticks(extent, |year, month0| {
            month0 == 0 && year.rem_euclid(step as i32) == 0
        }),
    }
}

/// Multiples of `every` ms since the epoch.
fn fixed_ticks(every: i64, extent: DateRange) -> Vec<Timestamp> {
    let first = extent.start.div_euclid(every) * every;
    let first = if first < extent.start { first + every } else { first };
    (0..)
        .map(|n| first + n * every)
        .take_while(|t| *t <= extent.end)
        .collect()
}

fn ceil_to_day(date: Timestamp) -> Timestamp {
    let floor = date.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY;
    if floor < date {
        floor + MILLIS_PER_DAY
    } else {
        floor
    }
}

fn day_ticks(step: u32, extent: DateRange) -> Vec<Timestamp> {
    (0..)
        .map(|n| ceil_to_day(extent.start) + n * MILLIS_PER_DAY)
        .take_while(|t| *t <= extent.end)
        .filter(|t| {
            DateTime::<Utc>::from_timestamp_millis(*t)
                .is_some_and(|dt| (dt.day0() % step) == 0)
        })
        .collect()
}

/// Sunday midnights.
fn week_ticks(step: u32, extent: DateRange) -> Vec<Timestamp> {
    let first_day = ceil_to_day(extent.start);
    // 1970-01-04 was a Sunday.
    let days_since_sunday = (first_day.div_euclid(MILLIS_PER_DAY) - 3).rem_euclid(7);
    let first = if days_since_sunday == 0 {
        first_day
    } else {
        first_day + (7 - days_since_sunday) * MILLIS_PER_DAY
    };
    let every = step as i64 * MILLIS_PER_WEEK;
    (0..)
        .map(|n| first + n * every)
        .take_while(|t| *t <= extent.end)
        .collect()
}

fn month_start(year: i32, month0: u32) -> Option<Timestamp> {
    let date = NaiveDate::from_ymd_opt(year, month0 + 1, 1)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis())
}

/// First-of-month midnights accepted by `keep(year, month0)`.
fn month_ticks(extent: DateRange, keep: impl Fn(i32, u32) -> bool) -> Vec<Timestamp> {
    let Some(start) = DateTime::<Utc>::from_timestamp_millis(extent.start) else {
        return Vec::new();
    };
    let (mut year, mut month0) = (start.year(), start.month0());
    let mut ticks = Vec::new();
    loop {
        let Some(t) = month_start(year, month0) else {
            break;
        };
        if t > extent.end {
            break;
        }
        if t >= extent.start && keep(year, month0) {
            ticks.push(t);
        }
        month0 += 1;
        if month0 == 12 {
            month0 = 0;
            year += 1;
        }
    }
    ticks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::discontinuity::{Identity, SkipWeekends};

    const MONDAY: Timestamp = 1_704_067_200_000; // 2024-01-01

    fn day(n: i64) -> Timestamp {
        MONDAY + n * MILLIS_PER_DAY
    }

    #[test]
    fn one_day_domain_picks_hours() {
        let sel = TickSelector::new().select(DateRange::new(day(0), day(1)), &Identity);
        // 24h / 10 ticks = 2.4h: 3h is closer than 1h by ratio.
        assert_eq!(sel.interval.unit, TickUnit::Hour);
        assert_eq!(sel.interval.step, 3);
        assert_eq!(sel.ticks.len(), 9);
        assert_eq!(sel.ticks[0], day(0));
        assert_eq!(*sel.ticks.last().unwrap(), day(1));
    }

    #[test]
    fn never_more_ticks_than_requested_span() {
        let sel = TickSelector::new()
            .with_count(4)
            .select(DateRange::new(day(0), day(30)), &Identity);
        let span = (day(30) - day(0)) as f64;
        assert!(span / sel.interval.duration as f64 <= 4.0);
    }

    #[test]
    fn minimum_interval_floors_selection() {
        let sel = TickSelector::new()
            .with_minimum_interval(TickUnit::Day, 1)
            .unwrap()
            .select(DateRange::new(day(0), day(0) + 6 * MILLIS_PER_HOUR), &Identity);
        assert_eq!(sel.interval.unit, TickUnit::Day);
        assert_eq!(sel.format(), "%a %d,%b %Y");
    }

    #[test]
    fn off_ladder_minimum_fails_fast() {
        let err = TickSelector::new()
            .with_minimum_interval(TickUnit::Day, 2)
            .unwrap_err();
        assert!(matches!(err, ChartError::InvalidConfiguration(_)));
    }

    #[test]
    fn multi_year_domain_synthesises_step() {
        let start = month_start(1990, 0).unwrap();
        let end = month_start(2020, 0).unwrap();
        let sel = TickSelector::new().select(DateRange::new(start, end), &Identity);
        assert_eq!(sel.interval.unit, TickUnit::Year);
        assert_eq!(sel.interval.step, 5);
        assert_eq!(sel.ticks.len(), 7);
        assert_eq!(sel.format_tick(sel.ticks[0]), "1990");
    }

    fn all_included_and_ascending(ticks: &[Timestamp]) -> bool {
        ticks.iter().all(|t| SkipWeekends.clamp_up(*t) == *t) && ticks.windows(2).all(|w| w[0] < w[1])
    }

    #[test]
    fn weekend_day_ticks_merge_into_monday() {
        // Two weeks of daily ticks with weekends skipped: 10 included days.
        let sel = TickSelector::new()
            .with_count(12)
            .select(DateRange::new(day(0), day(13)), &SkipWeekends);
        assert_eq!(sel.interval.unit, TickUnit::Day);
        assert!(all_included_and_ascending(&sel.ticks));
        assert_eq!(sel.ticks.len(), 10);
    }

    #[test]
    fn week_ticks_survive_skipped_weekends() {
        let sel = TickSelector::new()
            .with_minimum_interval(TickUnit::Day, 1)
            .unwrap()
            .select(DateRange::new(day(0), day(70)), &SkipWeekends);
        assert_eq!(sel.interval.unit, TickUnit::Week);
        assert!(!sel.ticks.is_empty());
        assert!(all_included_and_ascending(&sel.ticks));
        // Sunday ticks move to the following Monday.
        assert_eq!(sel.ticks[0], day(7));
        assert!(sel.ticks.iter().all(|t| (t - MONDAY).rem_euclid(MILLIS_PER_WEEK) == 0));
    }

    #[test]
    fn month_starting_on_saturday_moves_to_monday() {
        let start = month_start(2023, 0).unwrap();
        let end = month_start(2023, 11).unwrap() + 30 * MILLIS_PER_DAY;
        let sel = TickSelector::new()
            .with_count(12)
            .select(DateRange::new(start, end), &SkipWeekends);
        assert_eq!(sel.interval.unit, TickUnit::Month);
        assert_eq!(sel.ticks.len(), 12);
        assert!(all_included_and_ascending(&sel.ticks));
        // 2023-04-01 was a Saturday.
        let april = month_start(2023, 3).unwrap() + 2 * MILLIS_PER_DAY;
        assert!(sel.ticks.contains(&april));
        assert!(sel.labels().contains(&"April,2023".to_string()));
    }

    #[test]
    fn year_ticks_survive_skipped_weekends() {
        let start = month_start(2020, 0).unwrap();
        let end = month_start(2030, 0).unwrap();
        let sel = TickSelector::new().select(DateRange::new(start, end), &SkipWeekends);
        assert_eq!(sel.interval.unit, TickUnit::Year);
        assert!(all_included_and_ascending(&sel.ticks));
        // 2022-01-01 was a Saturday.
        let jan_2022 = month_start(2022, 0).unwrap() + 2 * MILLIS_PER_DAY;
        assert!(sel.ticks.contains(&jan_2022));
        assert_eq!(sel.format_tick(jan_2022), "2022");
    }

    #[test]
    fn week_ticks_land_on_sundays() {
        let ticks = week_ticks(1, DateRange::new(day(0), day(20)));
        assert_eq!(ticks, vec![day(6), day(13), day(20)]);
    }

    #[test]
    fn month_ticks_respect_step() {
        let start = month_start(2023, 0).unwrap();
        let end = month_start(2024, 0).unwrap();
        let ticks = month_ticks(DateRange::new(start, end), |_, m| m % 3 == 0);
        assert_eq!(ticks.len(), 5);
        assert_eq!(ticks[1], month_start(2023, 3).unwrap());
    }

    #[test]
    fn responsive_count() {
        assert_eq!(responsive_tick_count(1000.0, 100.0, 1), 10);
        assert_eq!(responsive_tick_count(950.0, 100.0, 1), 10);
        assert_eq!(responsive_tick_count(50.0, 100.0, 2), 2);
        assert_eq!(responsive_tick_count(100.0, 0.0, 3), 3);
    }

    #[test]
    fn labels_use_chosen_format() {
        let sel = TickSelector::new().select(DateRange::new(day(0), day(1)), &Identity);
        assert_eq!(sel.labels()[0], "00:00,01 Jan");
    }
}
