// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free indicator series over the candle closes. Every series
// is aligned by index with the candles it was computed from, with `None` for
// warm-up positions, so a renderer can zip it with the visible slice.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod moving_average;
pub mod rsi;

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::types::SeriesPoint;
use crate::view::extent::{symmetrical_about_zero, value_extent, Padding};

pub use bollinger::BollingerPoint;
pub use macd::MacdPoint;

/// Overlays drawn on top of the price series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryOverlay {
    MovingAverage,
    BollingerBands,
}

/// Panes stacked beneath the price pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondaryPane {
    Rsi,
    Macd,
    Volume,
}

/// Look-back periods used by every indicator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorSettings {
    pub moving_average_period: usize,
    pub bollinger_period: usize,
    pub bollinger_multiplier: f64,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            moving_average_period: moving_average::DEFAULT_PERIOD,
            bollinger_period: bollinger::DEFAULT_PERIOD,
            bollinger_multiplier: bollinger::DEFAULT_MULTIPLIER,
            rsi_period: rsi::DEFAULT_PERIOD,
            macd_fast: macd::DEFAULT_FAST,
            macd_slow: macd::DEFAULT_SLOW,
            macd_signal: macd::DEFAULT_SIGNAL,
        }
    }
}

/// Indicator series for the enabled overlays and panes. Disabled ones are
/// `None` and skipped in JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub moving_average: Option<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bollinger: Option<Vec<Option<BollingerPoint>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rsi: Option<Vec<Option<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macd: Option<Vec<Option<MacdPoint>>>,
}

impl IndicatorSet {
    pub fn compute(
        points: &[SeriesPoint],
        settings: &IndicatorSettings,
        overlays: &[PrimaryOverlay],
        panes: &[SecondaryPane],
    ) -> Self {
        let closes: Vec<f64> = points.iter().map(|p| p.close).collect();
        Self {
            moving_average: overlays
                .contains(&PrimaryOverlay::MovingAverage)
                .then(|| moving_average::sma_series(&closes, settings.moving_average_period)),
            bollinger: overlays.contains(&PrimaryOverlay::BollingerBands).then(|| {
                bollinger::bollinger_series(&closes, settings.bollinger_period, settings.bollinger_multiplier)
            }),
            rsi: panes
                .contains(&SecondaryPane::Rsi)
                .then(|| rsi::rsi_series(&closes, settings.rsi_period)),
            macd: panes.contains(&SecondaryPane::Macd).then(|| {
                macd::macd_series(&closes, settings.macd_fast, settings.macd_slow, settings.macd_signal)
            }),
        }
    }

    /// The same indicators restricted to `range` of the underlying series.
    pub fn slice(&self, range: Range<usize>) -> Self {
        fn cut<T: Clone>(series: &Option<Vec<T>>, range: &Range<usize>) -> Option<Vec<T>> {
            series.as_ref().map(|s| {
                let end = range.end.min(s.len());
                let start = range.start.min(end);
                s[start..end].to_vec()
            })
        }
        Self {
            moving_average: cut(&self.moving_average, &range),
            bollinger: cut(&self.bollinger, &range),
            rsi: cut(&self.rsi, &range),
            macd: cut(&self.macd, &range),
        }
    }
}

/// Y domain and fixed tick values for a secondary pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaneAxis {
    pub pane: SecondaryPane,
    pub domain: Option<(f64, f64)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tick_values: Vec<f64>,
}

const PANE_PADDING: f64 = 0.08;

/// Axis for `pane` given the full series and its indicators.
pub fn pane_axis(pane: SecondaryPane, points: &[SeriesPoint], indicators: &IndicatorSet) -> PaneAxis {
    match pane {
        SecondaryPane::Rsi => PaneAxis {
            pane,
            domain: Some(rsi::DOMAIN),
            tick_values: rsi::TICK_VALUES.to_vec(),
        },
        SecondaryPane::Macd => {
            let values = indicators
                .macd
                .iter()
                .flatten()
                .flatten()
                .map(|p| p.macd);
            PaneAxis {
                pane,
                domain: symmetrical_about_zero(values, Padding::symmetric(PANE_PADDING)),
                tick_values: Vec::new(),
            }
        }
        SecondaryPane::Volume => {
            let domain = value_extent(points.iter().map(|p| p.volume), Padding::symmetric(PANE_PADDING))
                .map(|(lo, hi)| (lo.max(0.0), hi));
            PaneAxis {
                pane,
                domain,
                tick_values: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(n: usize) -> Vec<SeriesPoint> {
        (0..n)
            .map(|i| SeriesPoint::new(i as i64, 1.0, 2.0, 0.5, 1.0 + i as f64, 10.0 + i as f64))
            .collect()
    }

    #[test]
    fn compute_only_enabled_series() {
        let data = points(40);
        let set = IndicatorSet::compute(
            &data,
            &IndicatorSettings::default(),
            &[PrimaryOverlay::MovingAverage],
            &[SecondaryPane::Rsi],
        );
        assert_eq!(set.moving_average.as_ref().map(Vec::len), Some(40));
        assert_eq!(set.rsi.as_ref().map(Vec::len), Some(40));
        assert!(set.bollinger.is_none());
        assert!(set.macd.is_none());
    }

    #[test]
    fn slice_keeps_alignment() {
        let data = points(30);
        let set = IndicatorSet::compute(&data, &IndicatorSettings::default(), &[PrimaryOverlay::MovingAverage], &[]);
        let sliced = set.slice(3..10);
        let ma = sliced.moving_average.unwrap();
        assert_eq!(ma.len(), 7);
        assert!(ma[0].is_none());
        // Index 4 of the full series is the first full 5-window.
        assert!((ma[1].unwrap() - 3.0).abs() < 1e-10);
    }

    #[test]
    fn rsi_axis_is_fixed() {
        let axis = pane_axis(SecondaryPane::Rsi, &[], &IndicatorSet::default());
        assert_eq!(axis.domain, Some((0.0, 100.0)));
        assert_eq!(axis.tick_values, vec![30.0, 50.0, 70.0]);
    }

    #[test]
    fn volume_axis_never_negative() {
        let data = points(5);
        let axis = pane_axis(SecondaryPane::Volume, &data, &IndicatorSet::default());
        let (lo, hi) = axis.domain.unwrap();
        assert!(lo >= 0.0);
        assert!(hi > 14.0);
    }

    #[test]
    fn macd_axis_symmetrical() {
        let data = points(60);
        let set = IndicatorSet::compute(&data, &IndicatorSettings::default(), &[], &[SecondaryPane::Macd]);
        let (lo, hi) = pane_axis(SecondaryPane::Macd, &data, &set).domain.unwrap();
        assert!((lo + hi).abs() < 1e-9);
        assert!(hi > 0.0);
    }
}
